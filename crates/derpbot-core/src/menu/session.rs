use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::time::{timeout_at, Instant};

use crate::{
    domain::{MessageRef, UserId},
    errors::Error,
    menu::{
        hub::{Listener, ReactionHub},
        marker::Marker,
    },
    Result,
};

/// A validated reaction from the session owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reaction {
    pub marker: Marker,
    pub user: UserId,
}

/// Result of one bounded wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Reaction(Reaction),
    TimedOut,
}

/// One pending interactive exchange bound to a rendered message and its owner.
///
/// Registration is released by [`Session::close`] or, failing that, on drop.
#[derive(Debug)]
pub struct Session {
    hub: Arc<ReactionHub>,
    anchor: MessageRef,
    owner: UserId,
    created_at: DateTime<Utc>,
    timeout: Duration,
    listener: Listener,
    closed: bool,
}

impl Session {
    pub fn open(
        hub: Arc<ReactionHub>,
        anchor: MessageRef,
        owner: UserId,
        timeout: Duration,
    ) -> Result<Self> {
        if timeout.is_zero() {
            return Err(Error::InvalidTimeout);
        }
        let listener = hub.register(anchor)?;
        Ok(Self {
            hub,
            anchor,
            owner,
            created_at: Utc::now(),
            timeout,
            listener,
            closed: false,
        })
    }

    pub fn anchor(&self) -> MessageRef {
        self.anchor
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Wait for an owner reaction accepted by `predicate`, bounded by the session timeout.
    ///
    /// The deadline is fixed when the call starts; rejected events do not extend it.
    /// Reactions from other users and unrecognised emoji are discarded.
    pub async fn await_event<P>(&mut self, mut predicate: P) -> Result<SessionEvent>
    where
        P: FnMut(&Reaction) -> bool,
    {
        if self.closed {
            return Err(Error::SessionClosed(self.anchor));
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let raw = match timeout_at(deadline, self.listener.events.recv()).await {
                Err(_elapsed) => return Ok(SessionEvent::TimedOut),
                Ok(None) => return Err(Error::SessionClosed(self.anchor)),
                Ok(Some(raw)) => raw,
            };

            if raw.user != self.owner {
                continue;
            }
            let Some(marker) = Marker::from_emoji(&raw.emoji) else {
                continue;
            };

            let reaction = Reaction {
                marker,
                user: raw.user,
            };
            if predicate(&reaction) {
                return Ok(SessionEvent::Reaction(reaction));
            }
        }
    }

    /// Release the registration. Safe to call any number of times.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.hub.unregister(self.anchor, self.listener.id);
        self.listener.events.close();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatId, MessageId};
    use crate::messaging::types::ReactionEvent;

    const OWNER: UserId = UserId(10);

    fn anchor() -> MessageRef {
        MessageRef::new(ChatId(1), MessageId(5))
    }

    fn react(hub: &ReactionHub, user: UserId, emoji: &str) -> bool {
        hub.dispatch(ReactionEvent {
            message: anchor(),
            user,
            emoji: emoji.to_string(),
        })
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let hub = Arc::new(ReactionHub::new());
        let err = Session::open(hub.clone(), anchor(), OWNER, Duration::ZERO).unwrap_err();
        assert!(matches!(err, Error::InvalidTimeout));
        assert_eq!(hub.active(), 0);
    }

    #[tokio::test]
    async fn yields_first_matching_owner_reaction() {
        let hub = Arc::new(ReactionHub::new());
        let mut session =
            Session::open(hub.clone(), anchor(), OWNER, Duration::from_secs(30)).unwrap();

        assert!(react(&hub, UserId(99), "1\u{fe0f}\u{20e3}"));
        assert!(react(&hub, OWNER, "👍"));
        assert!(react(&hub, OWNER, "▶"));
        assert!(react(&hub, OWNER, "2\u{fe0f}\u{20e3}"));

        let ev = session
            .await_event(|r| r.marker.position().is_some())
            .await
            .unwrap();
        assert_eq!(
            ev,
            SessionEvent::Reaction(Reaction {
                marker: Marker::keycap(2).unwrap(),
                user: OWNER,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_without_qualifying_event() {
        let hub = Arc::new(ReactionHub::new());
        let mut session =
            Session::open(hub.clone(), anchor(), OWNER, Duration::from_secs(30)).unwrap();

        react(&hub, UserId(99), "▶");
        let ev = session.await_event(|_| true).await.unwrap();
        assert_eq!(ev, SessionEvent::TimedOut);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_releases_registration() {
        let hub = Arc::new(ReactionHub::new());
        let mut session =
            Session::open(hub.clone(), anchor(), OWNER, Duration::from_secs(30)).unwrap();
        assert!(hub.is_registered(anchor()));

        session.close();
        session.close();
        assert!(session.is_closed());
        assert_eq!(hub.active(), 0);
        assert!(!react(&hub, OWNER, "▶"));

        let err = session.await_event(|_| true).await.unwrap_err();
        assert!(matches!(err, Error::SessionClosed(_)));
    }

    #[test]
    fn drop_releases_registration() {
        let hub = Arc::new(ReactionHub::new());
        {
            let _session =
                Session::open(hub.clone(), anchor(), OWNER, Duration::from_secs(30)).unwrap();
            assert_eq!(hub.active(), 1);
        }
        assert_eq!(hub.active(), 0);
    }
}
