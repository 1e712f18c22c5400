use std::sync::Arc;

use anyhow::Context;
use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use derpbot_core::{
    commands::{CommandService, MenuTimeouts},
    config::Config,
    menu::ReactionHub,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    store::{FileLinkStore, JsonPrefixStore, LinkStore, PrefixResolver},
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub messenger: Arc<dyn MessagingPort>,
    pub hub: Arc<ReactionHub>,
    pub commands: Arc<CommandService>,
    /// Our own `@username`, for the mention trigger.
    pub bot_username: Option<String>,
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    let me = bot
        .get_me()
        .await
        .context("could not log in to Telegram (check the bot token)")?;
    let bot_username = me.user.username.clone();
    tracing::info!(
        username = bot_username.as_deref().unwrap_or("?"),
        id = me.user.id.0,
        "logged in"
    );

    let prefixes = PrefixResolver::new(
        Arc::new(JsonPrefixStore::open(&cfg.prefix_file)?),
        cfg.default_prefix.clone(),
    );
    let links: Arc<dyn LinkStore> = Arc::new(FileLinkStore::new(&cfg.links_file));
    tracing::info!(
        default_prefix = %cfg.default_prefix,
        prefix_file = %cfg.prefix_file.display(),
        links_file = %cfg.links_file.display(),
        "stores ready"
    );

    // Menu edits and marker attachment are bursty; keep a 429 RetryAfter retry at the
    // Telegram adapter layer as well.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));
    let hub = Arc::new(ReactionHub::new());

    let commands = Arc::new(CommandService::new(
        messenger.clone(),
        hub.clone(),
        prefixes,
        links,
        MenuTimeouts {
            choice: cfg.choice_timeout,
            browse: cfg.browse_timeout,
        },
    ));

    let state = Arc::new(AppState {
        messenger,
        hub,
        commands,
        bot_username,
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
