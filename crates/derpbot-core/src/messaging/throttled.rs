use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef, UserId},
    menu::marker::Marker,
    messaging::{
        port::MessagingPort,
        types::{MessageBody, MessagingCapabilities, ReactionCount},
    },
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* platform API calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls per chat.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40),  // ~25/sec
            per_chat_min_interval: Duration::from_millis(250), // reaction bursts stay under ~4/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// MessagingPort decorator that rate-limits outbound calls.
///
/// Menus already pace their reaction attachments; this is the floor underneath for
/// everything else (command replies, page edits, reaction clean-up).
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<i64, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_chat(&self, chat_id: i64) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        map.entry(chat_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_chat_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_chat(&self, chat_id: i64) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat_id).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(chat_wait);
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn send(&self, chat_id: ChatId, body: &MessageBody) -> Result<MessageRef> {
        self.throttle_chat(chat_id.0).await;
        self.inner.send(chat_id, body).await
    }

    async fn edit(&self, msg: MessageRef, body: &MessageBody) -> Result<()> {
        self.throttle_chat(msg.chat_id.0).await;
        self.inner.edit(msg, body).await
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.throttle_chat(msg.chat_id.0).await;
        self.inner.delete_message(msg).await
    }

    async fn add_reaction(&self, msg: MessageRef, marker: Marker) -> Result<()> {
        self.throttle_chat(msg.chat_id.0).await;
        self.inner.add_reaction(msg, marker).await
    }

    async fn reactions(&self, msg: MessageRef) -> Result<Vec<ReactionCount>> {
        self.throttle_chat(msg.chat_id.0).await;
        self.inner.reactions(msg).await
    }

    async fn remove_reaction(&self, msg: MessageRef, marker: Marker, user: UserId) -> Result<()> {
        self.throttle_chat(msg.chat_id.0).await;
        self.inner.remove_reaction(msg, marker, user).await
    }

    async fn clear_affordances(&self, msg: MessageRef) -> Result<()> {
        self.throttle_chat(msg.chat_id.0).await;
        self.inner.clear_affordances(msg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn limiter_spaces_reservations_by_interval() {
        let mut lim = IntervalLimiter::new(Duration::from_millis(100));
        assert_eq!(lim.reserve(), Duration::ZERO);
        assert_eq!(lim.reserve(), Duration::from_millis(100));
        assert_eq!(lim.reserve(), Duration::from_millis(200));

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(lim.reserve(), Duration::ZERO);
    }
}
