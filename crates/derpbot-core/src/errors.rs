use std::path::PathBuf;

use crate::domain::MessageRef;

/// Core error type for the bot.
///
/// Adapter crates map their platform errors into this type so the command layer
/// can tell user-facing failures from a vanished message or a broken store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("menu configuration error: {0}")]
    MenuConfig(String),

    #[error("message {0} no longer exists")]
    MessageGone(MessageRef),

    #[error("a menu is already active on message {0}")]
    SessionActive(MessageRef),

    #[error("session timeout must be greater than zero")]
    InvalidTimeout,

    #[error("session on message {0} is closed")]
    SessionClosed(MessageRef),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store error: {path}: {reason}")]
    Store { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// True when the target message was deleted out from under us.
    pub fn is_message_gone(&self) -> bool {
        matches!(self, Error::MessageGone(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
