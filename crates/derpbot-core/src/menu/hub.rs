//! Listener registration table for reaction events.
//!
//! The adapter pushes every reaction it sees into [`ReactionHub::dispatch`]; the
//! hub forwards it to the one session registered on that message, if any.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use tokio::sync::mpsc;

use crate::{domain::MessageRef, errors::Error, messaging::types::ReactionEvent, Result};

#[derive(Debug)]
struct Registration {
    id: u64,
    tx: mpsc::UnboundedSender<ReactionEvent>,
}

/// Handle returned by [`ReactionHub::register`].
#[derive(Debug)]
pub struct Listener {
    pub id: u64,
    pub events: mpsc::UnboundedReceiver<ReactionEvent>,
}

/// Registration table keyed by anchor message.
///
/// Insert-if-absent: a second registration on a message that already has a live
/// listener is rejected with [`Error::SessionActive`].
#[derive(Debug, Default)]
pub struct ReactionHub {
    // Held only for map operations, never across an await.
    listeners: Mutex<HashMap<MessageRef, Registration>>,
    next_id: AtomicU64,
}

impl ReactionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, anchor: MessageRef) -> Result<Listener> {
        let mut map = self
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(existing) = map.get(&anchor) {
            if !existing.tx.is_closed() {
                return Err(Error::SessionActive(anchor));
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, events) = mpsc::unbounded_channel();
        map.insert(anchor, Registration { id, tx });
        Ok(Listener { id, events })
    }

    /// Remove the registration `id` on `anchor`. Returns false when it was already gone
    /// (or replaced by a newer one, which is left untouched).
    pub fn unregister(&self, anchor: MessageRef, id: u64) -> bool {
        let mut map = self
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match map.get(&anchor) {
            Some(reg) if reg.id == id => {
                map.remove(&anchor);
                true
            }
            _ => false,
        }
    }

    /// Route one event to the listener on its message. Returns true when delivered.
    pub fn dispatch(&self, event: ReactionEvent) -> bool {
        let mut map = self
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let anchor = event.message;
        let Some(reg) = map.get(&anchor) else {
            return false;
        };

        if reg.tx.send(event).is_err() {
            // Receiver dropped without unregistering.
            map.remove(&anchor);
            return false;
        }
        true
    }

    pub fn is_registered(&self, anchor: MessageRef) -> bool {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&anchor)
            .is_some_and(|reg| !reg.tx.is_closed())
    }

    pub fn active(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
