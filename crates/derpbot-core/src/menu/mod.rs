//! Reaction-driven menus: a single-choice prompt and a paginated browser.
//!
//! Both render one message, open a [`session::Session`] on it and attach their
//! markers from a background task so the wait starts before the last marker lands.

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;

use crate::{
    domain::{ChatId, MessageRef, UserId},
    messaging::port::MessagingPort,
};

pub mod browser;
pub mod choice;
pub mod hub;
pub mod marker;
pub mod session;

pub use browser::{Browser, Entry};
pub use choice::ChoicePrompt;
pub use hub::ReactionHub;
pub use marker::{Keycap, Marker, Nav};
pub use session::{Reaction, Session, SessionEvent};

/// Where a menu is rendered and who asked for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MenuContext {
    pub chat: ChatId,
    pub invoker: UserId,
}

/// Attach `markers` to `msg` one at a time, sleeping `pacing` between attachments.
///
/// The first failure (typically the message being deleted) ends the sequence.
pub(crate) fn spawn_affordances(
    messenger: Arc<dyn MessagingPort>,
    msg: MessageRef,
    markers: Vec<Marker>,
    pacing: Option<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        for (i, marker) in markers.into_iter().enumerate() {
            if i > 0 {
                if let Some(pause) = pacing {
                    tokio::time::sleep(pause).await;
                }
            }
            if let Err(e) = messenger.add_reaction(msg, marker).await {
                tracing::debug!(message = %msg, %marker, error = %e, "stopped attaching menu markers");
                return;
            }
        }
    })
}

/// Delete a menu message, ignoring failures (it may already be gone).
pub(crate) async fn discard(messenger: &dyn MessagingPort, msg: MessageRef) {
    if let Err(e) = messenger.delete_message(msg).await {
        tracing::debug!(message = %msg, error = %e, "menu message already gone");
    }
}
