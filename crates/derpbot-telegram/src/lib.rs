//! Telegram adapter (teloxide).
//!
//! This crate implements the `derpbot-core` MessagingPort over Telegram Bot API.
//! Telegram bots cannot attach emoji reactions to their own messages, so menu
//! markers are rendered as inline keyboard buttons; a button press arrives as a
//! callback query and is fed to the reaction hub like a reaction.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode},
    ApiError, RequestError,
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use derpbot_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    formatting::render_body_html,
    menu::Marker,
    messaging::{
        port::MessagingPort,
        types::{MessageBody, MessagingCapabilities, ReactionCount},
    },
    Result,
};

/// Callback data prefix for menu buttons: `menu:<emoji>`.
pub const MENU_CALLBACK_PREFIX: &str = "menu:";

const BUTTONS_PER_ROW: usize = 5;

/// Markers currently shown as buttons, per message.
///
/// Telegram drops the keyboard on a text edit unless it is resent, so the adapter
/// has to remember it. Entries exist only between the first successful attachment
/// and `release`.
#[derive(Debug, Default)]
struct KeyboardLedger {
    inner: Mutex<HashMap<MessageRef, Vec<Marker>>>,
}

impl KeyboardLedger {
    fn attached(&self, msg: MessageRef) -> Vec<Marker> {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&msg)
            .cloned()
            .unwrap_or_default()
    }

    /// The keyboard `msg` would have with `marker` added. Nothing is recorded.
    fn with_marker(&self, msg: MessageRef, marker: Marker) -> Vec<Marker> {
        let mut markers = self.attached(msg);
        if !markers.contains(&marker) {
            markers.push(marker);
        }
        markers
    }

    /// Record a keyboard Telegram has accepted.
    fn commit(&self, msg: MessageRef, markers: Vec<Marker>) {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(msg, markers);
    }

    fn release(&self, msg: MessageRef) -> Vec<Marker> {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&msg)
            .unwrap_or_default()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

pub struct TelegramMessenger {
    bot: Bot,
    keyboards: KeyboardLedger,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            keyboards: KeyboardLedger::default(),
        }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    async fn with_retry<T, Fut>(
        &self,
        mut op: impl FnMut() -> Fut,
    ) -> std::result::Result<T, RequestError>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    sleep(d).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn map_err(e: RequestError, msg: Option<MessageRef>) -> Error {
    match (&e, msg) {
        (
            RequestError::Api(
                ApiError::MessageToEditNotFound
                | ApiError::MessageToDeleteNotFound
                | ApiError::MessageIdInvalid,
            ),
            Some(msg),
        ) => Error::MessageGone(msg),
        _ => Error::External(format!("telegram error: {e}")),
    }
}

/// Outcome of an edit. "Not modified" means the message already shows what was asked.
fn settle_edit<T>(res: std::result::Result<T, RequestError>, msg: MessageRef) -> Result<()> {
    match res {
        Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
        Err(e) => Err(map_err(e, Some(msg))),
    }
}

/// Lay menu markers out as callback buttons: choices in rows of five, navigation on its own row.
pub fn keyboard_for(markers: &[Marker]) -> InlineKeyboardMarkup {
    let button = |m: &Marker| {
        InlineKeyboardButton::callback(m.emoji(), format!("{MENU_CALLBACK_PREFIX}{}", m.emoji()))
    };

    let (nav, choices): (Vec<Marker>, Vec<Marker>) =
        markers.iter().partition(|m| m.nav().is_some());

    let mut rows: Vec<Vec<InlineKeyboardButton>> = choices
        .chunks(BUTTONS_PER_ROW)
        .map(|row| row.iter().map(button).collect())
        .collect();
    if !nav.is_empty() {
        rows.push(nav.iter().map(button).collect());
    }
    InlineKeyboardMarkup::new(rows)
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            reports_reaction_counts: false,
        }
    }

    async fn send(&self, chat_id: ChatId, body: &MessageBody) -> Result<MessageRef> {
        let html = render_body_html(body);
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), html.clone())
                    .parse_mode(ParseMode::Html)
                    .disable_web_page_preview(true)
            })
            .await
            .map_err(|e| map_err(e, None))?;

        Ok(MessageRef::new(chat_id, MessageId(msg.id.0)))
    }

    async fn edit(&self, msg: MessageRef, body: &MessageBody) -> Result<()> {
        let html = render_body_html(body);
        let markers = self.keyboards.attached(msg);
        let res = self
            .with_retry(|| {
                let req = self
                    .bot
                    .edit_message_text(
                        Self::tg_chat(msg.chat_id),
                        Self::tg_msg_id(msg.message_id),
                        html.clone(),
                    )
                    .parse_mode(ParseMode::Html)
                    .disable_web_page_preview(true);
                if markers.is_empty() {
                    req
                } else {
                    req.reply_markup(keyboard_for(&markers))
                }
            })
            .await;
        settle_edit(res, msg)
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.keyboards.release(msg);
        self.with_retry(|| {
            self.bot
                .delete_message(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
        })
        .await
        .map_err(|e| map_err(e, Some(msg)))?;
        Ok(())
    }

    async fn add_reaction(&self, msg: MessageRef, marker: Marker) -> Result<()> {
        let markers = self.keyboards.with_marker(msg, marker);
        let res = self
            .with_retry(|| {
                self.bot
                    .edit_message_reply_markup(
                        Self::tg_chat(msg.chat_id),
                        Self::tg_msg_id(msg.message_id),
                    )
                    .reply_markup(keyboard_for(&markers))
            })
            .await;
        settle_edit(res, msg)?;
        self.keyboards.commit(msg, markers);
        Ok(())
    }

    async fn reactions(&self, _msg: MessageRef) -> Result<Vec<ReactionCount>> {
        // Button presses leave no residue to count or clear.
        Ok(Vec::new())
    }

    async fn remove_reaction(&self, _msg: MessageRef, _marker: Marker, _user: UserId) -> Result<()> {
        Ok(())
    }

    async fn clear_affordances(&self, msg: MessageRef) -> Result<()> {
        if self.keyboards.release(msg).is_empty() {
            return Ok(());
        }
        // An edit without `reply_markup` removes the keyboard.
        let res = self
            .with_retry(|| {
                self.bot.edit_message_reply_markup(
                    Self::tg_chat(msg.chat_id),
                    Self::tg_msg_id(msg.message_id),
                )
            })
            .await;
        settle_edit(res, msg)
    }
}
