use std::sync::Arc;

use teloxide::prelude::*;

use derpbot_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    messaging::types::ReactionEvent,
};

use crate::{router::AppState, MENU_CALLBACK_PREFIX};

const INACTIVE_NOTICE: &str = "This menu is no longer active.";

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let cb_id = q.id.clone();
    let emoji = q
        .data
        .as_deref()
        .and_then(|d| d.strip_prefix(MENU_CALLBACK_PREFIX));

    // Always answer the callback query so the client stops its spinner.
    let (Some(emoji), Some(message)) = (emoji, q.message.as_ref()) else {
        let _ = bot.answer_callback_query(cb_id).await;
        return Ok(());
    };

    let event = ReactionEvent {
        message: MessageRef::new(ChatId(message.chat.id.0), MessageId(message.id.0)),
        user: UserId(q.from.id.0 as i64),
        emoji: emoji.to_string(),
    };
    let delivered = state.hub.dispatch(event);
    tracing::debug!(
        chat = message.chat.id.0,
        message = message.id.0,
        user = q.from.id.0,
        emoji,
        delivered,
        "menu button pressed"
    );

    let answer = bot.answer_callback_query(cb_id);
    let _ = if delivered {
        answer.await
    } else {
        answer.text(INACTIVE_NOTICE).await
    };
    Ok(())
}
