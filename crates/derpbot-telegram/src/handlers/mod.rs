//! Telegram update handlers.
//!
//! Messages are parsed for commands against the chat's prefix; callback queries
//! from menu buttons are forwarded to the reaction hub.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use derpbot_core::{commands::parse_invocation, domain::ChatId};

use crate::router::AppState;

mod callback;
mod commands;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    callback::handle_callback(bot, q, state).await
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(user) = msg.from() else {
        return Ok(());
    };
    if user.is_bot {
        return Ok(());
    }

    let chat = ChatId(msg.chat.id.0);
    let prefix = state.commands.prefixes().resolve(chat);
    let Some(invocation) = parse_invocation(text, &prefix, state.bot_username.as_deref()) else {
        return Ok(());
    };

    // The dispatcher handles one update per chat at a time; a menu waiting for
    // button presses from this chat would otherwise block its own callbacks.
    let user = user.clone();
    tokio::spawn(commands::run_command(bot, state, msg, user, invocation));
    Ok(())
}
