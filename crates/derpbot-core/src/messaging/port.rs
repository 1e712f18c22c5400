use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef, UserId},
    menu::marker::Marker,
    messaging::types::{MessageBody, MessagingCapabilities, ReactionCount},
    Result,
};

/// Cross-messenger port.
///
/// Implementations report a deleted or unknown target as
/// [`Error::MessageGone`](crate::Error::MessageGone) so menus can end quietly.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send(&self, chat_id: ChatId, body: &MessageBody) -> Result<MessageRef>;
    async fn edit(&self, msg: MessageRef, body: &MessageBody) -> Result<()>;
    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    /// Attach a reactable affordance to `msg`.
    async fn add_reaction(&self, msg: MessageRef, marker: Marker) -> Result<()>;

    /// Live reaction state of `msg`, limited to recognised markers.
    async fn reactions(&self, msg: MessageRef) -> Result<Vec<ReactionCount>>;

    /// Remove `user`'s reaction with `marker` from `msg`.
    async fn remove_reaction(&self, msg: MessageRef, marker: Marker, user: UserId) -> Result<()>;

    /// Detach every affordance from `msg` and forget any state kept for it.
    /// Called once a menu on a message that stays behind has ended.
    async fn clear_affordances(&self, msg: MessageRef) -> Result<()>;
}
