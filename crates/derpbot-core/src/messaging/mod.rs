//! Cross-messenger abstractions (Telegram today; other chat platforms behind the same port).

pub mod port;
pub mod throttled;
pub mod types;
