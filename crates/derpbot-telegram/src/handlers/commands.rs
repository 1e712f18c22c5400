use std::sync::Arc;

use teloxide::{prelude::*, types::User};

use derpbot_core::{
    commands::{user_facing_message, Invocation, Invoker},
    domain::{ChatId, UserId},
    messaging::types::{Embed, MessageBody},
};

use crate::router::AppState;

const MISSING_ADMIN: &str = "You need to be a chat administrator to run this command.";

/// Run one parsed command to completion, reporting failures back to the chat.
pub(super) async fn run_command(
    bot: Bot,
    state: Arc<AppState>,
    msg: Message,
    user: User,
    invocation: Invocation,
) {
    let who = Invoker {
        chat: ChatId(msg.chat.id.0),
        user: UserId(user.id.0 as i64),
    };
    tracing::info!(
        chat = who.chat.0,
        user = who.user.0,
        command = ?invocation.kind,
        "command invoked"
    );

    if invocation.kind.requires_admin() && !is_admin(&bot, &msg, &user).await {
        reply_error(&state, &who, MISSING_ADMIN).await;
        return;
    }

    if let Err(e) = state.commands.execute(&invocation, &who).await {
        if e.is_message_gone() {
            return;
        }
        tracing::warn!(
            chat = who.chat.0,
            command = ?invocation.kind,
            error = %e,
            "command failed"
        );
        reply_error(&state, &who, &user_facing_message(&e)).await;
    }
}

/// Private chats count as administered by the user; elsewhere owner or admin is required.
async fn is_admin(bot: &Bot, msg: &Message, user: &User) -> bool {
    if msg.chat.is_private() {
        return true;
    }
    match bot.get_chat_member(msg.chat.id, user.id).await {
        Ok(member) => member.is_privileged(),
        Err(e) => {
            tracing::warn!(chat = msg.chat.id.0, user = user.id.0, error = %e, "admin lookup failed");
            false
        }
    }
}

async fn reply_error(state: &AppState, who: &Invoker, text: &str) {
    let body = MessageBody::embed(Embed::new(text));
    if let Err(e) = state.messenger.send(who.chat, &body).await {
        tracing::warn!(chat = who.chat.0, error = %e, "could not report command error");
    }
}
