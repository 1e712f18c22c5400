//! Text command parsing and the platform-neutral command bodies.
//!
//! The adapter resolves the chat prefix, calls [`parse_invocation`], performs the
//! admin check for [`CommandKind::requires_admin`] commands, then hands the
//! invocation to [`CommandService::execute`]. Each invocation runs in its own task
//! since the menu commands stay suspended until their session ends.

use std::{sync::Arc, time::Duration};

use rand::seq::SliceRandom;

use crate::{
    domain::{ChatId, UserId},
    errors::Error,
    menu::{Browser, ChoicePrompt, Entry, MenuContext, ReactionHub},
    messaging::{
        port::MessagingPort,
        types::{Embed, MessageBody, GREEN, PURPLE},
    },
    store::{Link, LinkCategory, LinkStore, PrefixChange, PrefixResolver},
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    Test,
    NewPrefix,
    Help,
    Coinflip,
    AddLink,
    RemoveLink,
    Links,
    Category(LinkCategory),
}

impl CommandKind {
    /// Case-insensitive lookup by name or alias.
    pub fn lookup(name: &str) -> Option<Self> {
        let kind = match name.to_lowercase().as_str() {
            "test" => CommandKind::Test,
            "newprefix" | "np" => CommandKind::NewPrefix,
            "help" => CommandKind::Help,
            "coinflip" | "cf" => CommandKind::Coinflip,
            "add_link" | "al" => CommandKind::AddLink,
            "remove_link" | "rl" => CommandKind::RemoveLink,
            "links" => CommandKind::Links,
            "wordpress" | "wp" => CommandKind::Category(LinkCategory::WordPress),
            "substack" | "ss" => CommandKind::Category(LinkCategory::Substack),
            "blogspot" | "bs" => CommandKind::Category(LinkCategory::Blogspot),
            "medium" | "md" => CommandKind::Category(LinkCategory::Medium),
            _ => return None,
        };
        Some(kind)
    }

    /// Commands gated on chat administrators.
    pub fn requires_admin(self) -> bool {
        matches!(
            self,
            CommandKind::NewPrefix | CommandKind::AddLink | CommandKind::RemoveLink
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub kind: CommandKind,
    pub args: String,
}

/// Recognise a command in `text`.
///
/// Triggers: the chat `prefix`, a leading `@bot_username` mention, or a native
/// `/command` (optionally `/command@bot_username`).
pub fn parse_invocation(text: &str, prefix: &str, bot_username: Option<&str>) -> Option<Invocation> {
    let text = text.trim_start();
    let body = strip_trigger(text, prefix, bot_username)?;

    let mut parts = body.trim_start().splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim().to_string();

    // `/cmd@otherbot` is addressed to someone else.
    let (name, addressee) = match name.split_once('@') {
        Some((n, who)) => (n, Some(who)),
        None => (name, None),
    };
    if let Some(who) = addressee {
        if !bot_username.is_some_and(|me| me.eq_ignore_ascii_case(who)) {
            return None;
        }
    }

    let kind = CommandKind::lookup(name)?;
    Some(Invocation { kind, args: rest })
}

fn strip_trigger<'a>(text: &'a str, prefix: &str, bot_username: Option<&str>) -> Option<&'a str> {
    if !prefix.is_empty() {
        if let Some(rest) = text.strip_prefix(prefix) {
            return Some(rest);
        }
    }

    if let Some(me) = bot_username {
        let mention = format!("@{me}");
        let head = text.get(..mention.len());
        if head.is_some_and(|h| h.eq_ignore_ascii_case(&mention)) {
            let rest = &text[mention.len()..];
            if rest.starts_with(char::is_whitespace) {
                return Some(rest);
            }
        }
    }

    text.strip_prefix('/')
}

/// Split arguments on whitespace, honouring double quotes (`"two words"`).
pub fn split_args(args: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in args.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    out.push(std::mem::take(&mut cur));
                    has_token = false;
                }
            }
            c => {
                cur.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        out.push(cur);
    }
    out
}

fn required<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| Error::InvalidArgument(format!("{name} is a required argument that is missing.")))
}

/// Text shown to the chat when a command fails.
pub fn user_facing_message(err: &Error) -> String {
    match err {
        Error::InvalidArgument(msg) => msg.clone(),
        Error::MenuConfig(_) | Error::SessionActive(_) => err.to_string(),
        _ => "Something went wrong running that command.".to_string(),
    }
}

/// Who invoked a command and where.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invoker {
    pub chat: ChatId,
    pub user: UserId,
}

impl Invoker {
    fn menu(&self) -> MenuContext {
        MenuContext {
            chat: self.chat,
            invoker: self.user,
        }
    }
}

/// Menu timeouts used by the commands.
#[derive(Clone, Copy, Debug)]
pub struct MenuTimeouts {
    pub choice: Duration,
    pub browse: Duration,
}

/// Platform-neutral command bodies.
pub struct CommandService {
    messenger: Arc<dyn MessagingPort>,
    prefixes: PrefixResolver,
    links: Arc<dyn LinkStore>,
    choice: ChoicePrompt,
    browser: Browser,
    timeouts: MenuTimeouts,
}

impl CommandService {
    pub fn new(
        messenger: Arc<dyn MessagingPort>,
        hub: Arc<ReactionHub>,
        prefixes: PrefixResolver,
        links: Arc<dyn LinkStore>,
        timeouts: MenuTimeouts,
    ) -> Self {
        Self {
            choice: ChoicePrompt::new(messenger.clone(), hub.clone()),
            browser: Browser::new(messenger.clone(), hub),
            messenger,
            prefixes,
            links,
            timeouts,
        }
    }

    pub fn prefixes(&self) -> &PrefixResolver {
        &self.prefixes
    }

    pub async fn execute(&self, inv: &Invocation, who: &Invoker) -> Result<()> {
        match inv.kind {
            CommandKind::Test => self.reply_text(who, "I'm up and running").await,
            CommandKind::NewPrefix => self.new_prefix(who, &inv.args).await,
            CommandKind::Help => {
                let prefix = self.prefixes.resolve(who.chat);
                self.reply_embed(who, help_embed(&prefix)).await
            }
            CommandKind::Coinflip => self.reply_embed(who, coinflip_embed()).await,
            CommandKind::AddLink => self.add_link(who, &inv.args).await,
            CommandKind::RemoveLink => self.remove_link(who, &inv.args).await,
            CommandKind::Links => self.choose_category(who).await,
            CommandKind::Category(category) => self.browse_category(who, category).await,
        }
    }

    async fn reply_text(&self, who: &Invoker, text: &str) -> Result<()> {
        self.messenger
            .send(who.chat, &MessageBody::text(text))
            .await
            .map(|_| ())
    }

    async fn reply_embed(&self, who: &Invoker, embed: Embed) -> Result<()> {
        self.messenger
            .send(who.chat, &MessageBody::embed(embed))
            .await
            .map(|_| ())
    }

    async fn new_prefix(&self, who: &Invoker, args: &str) -> Result<()> {
        let new_prefix = args.trim();
        if new_prefix.is_empty() {
            return Err(Error::InvalidArgument(
                "new_prefix is a required argument that is missing.".to_string(),
            ));
        }

        let reply = match self.prefixes.change(who.chat, new_prefix)? {
            PrefixChange::Set(p) => format!("Set the prefix to {p}"),
            PrefixChange::Reset(p) => format!("Set the prefix back to {p}"),
            PrefixChange::AlreadyDefault => {
                "There's no custom prefix being used in this server!".to_string()
            }
        };
        tracing::info!(chat = who.chat.0, user = who.user.0, prefix = new_prefix, "prefix changed");
        self.reply_text(who, &reply).await
    }

    async fn add_link(&self, who: &Invoker, args: &str) -> Result<()> {
        let args = split_args(args);
        let category = required(&args, 0, "category")?;
        let title = required(&args, 1, "title")?;
        let url = required(&args, 2, "link")?;

        let Ok(category) = category.parse::<LinkCategory>() else {
            let reply = format!("'{category}' is not a valid category. Link not added.");
            return self.reply_text(who, &reply).await;
        };

        self.links.append(&Link::new(category, title, url)?)?;
        tracing::info!(chat = who.chat.0, %category, title, "link added");
        self.reply_text(
            who,
            &format!("Your link has been added to the category {category}!"),
        )
        .await
    }

    async fn remove_link(&self, who: &Invoker, args: &str) -> Result<()> {
        let args = split_args(args);
        let category = required(&args, 0, "category")?;
        let title = required(&args, 1, "title")?;

        let Ok(category) = category.parse::<LinkCategory>() else {
            let reply =
                format!("'{category}' is not a valid category. Check your spelling and try again!");
            return self.reply_text(who, &reply).await;
        };

        if !self.links.remove(category, title)? {
            let reply = format!("'{title}' was not found. Check your spelling and try again!");
            return self.reply_text(who, &reply).await;
        }
        tracing::info!(chat = who.chat.0, %category, title, "link removed");
        self.reply_text(
            who,
            &format!("Link titled '{title}' has been removed from the category '{category}'!"),
        )
        .await
    }

    async fn choose_category(&self, who: &Invoker) -> Result<()> {
        let options: Vec<String> = LinkCategory::ALL
            .iter()
            .map(|c| c.display_name().to_string())
            .collect();

        let picked = self
            .choice
            .ask(&who.menu(), &options, None, self.timeouts.choice)
            .await?;
        let Some(picked) = picked else {
            return Ok(());
        };
        let Some(category) = LinkCategory::ALL
            .into_iter()
            .find(|c| c.display_name() == picked)
        else {
            return Ok(());
        };

        self.browse_category(who, category).await
    }

    async fn browse_category(&self, who: &Invoker, category: LinkCategory) -> Result<()> {
        let entries = self
            .links
            .list(category)?
            .into_iter()
            .map(|link| Entry::new(link.title, Some(link.url)))
            .collect();
        let title = format!("{} Links", category.display_name());

        self.browser
            .browse(&who.menu(), Some(&title), entries, None, self.timeouts.browse)
            .await
    }
}

/// The `help` embed, worded for the chat's current prefix.
pub fn help_embed(prefix: &str) -> Embed {
    let example = if prefix == "*" { "!" } else { "*" };
    let p = prefix;
    let commands = [
        format!("**{p}help**\n • Show available commands"),
        format!(
            "**{p}newprefix ({p}np)**\n • eg. type '{p}newprefix {example}' to change prefix from '{p}' to '{example}'"
        ),
        format!("**{p}links**\n • Pick a link category and browse it"),
        format!("**{p}wordpress ({p}wp)**\n • Show list of recommended WordPress links"),
        format!("**{p}substack ({p}ss)**\n • Show list of recommended SubStack links"),
        format!("**{p}blogspot ({p}bs)**\n • Show list of recommended BlogSpot links"),
        format!("**{p}medium ({p}md)**\n • Show list of recommended Medium links"),
        format!(
            "**{p}add_link ({p}al)**\n • Add a link to the database (Admin only).\n   eg. {p}al <category> <title> <link>"
        ),
        format!(
            "**{p}remove_link ({p}rl)**\n • Remove a link from the database (Admin only).\n   eg. {p}rl <category> <title>"
        ),
        format!("**{p}coinflip ({p}cf)**\n • COINFLIP!!!!"),
    ];

    Embed::new("These are the commands you can use:")
        .author("Available Commands")
        .color(GREEN)
        .field("⍟ Commands ⍟", commands.join("\n"))
}

fn coinflip_embed() -> Embed {
    let side = ["Heads", "Tails"]
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Heads");
    Embed::new(side).author("Coinflip").color(PURPLE)
}
