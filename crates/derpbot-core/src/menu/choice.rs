use std::{sync::Arc, time::Duration};

use crate::{
    domain::UserId,
    errors::Error,
    menu::{
        discard,
        hub::ReactionHub,
        marker::{Marker, MAX_CHOICES},
        session::{Session, SessionEvent},
        spawn_affordances, MenuContext,
    },
    messaging::{
        port::MessagingPort,
        types::{Embed, MessageBody},
    },
    Result,
};

pub const DEFAULT_CHOICE_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between marker attachments for `option_count` options.
pub fn attach_pacing(option_count: usize) -> Option<Duration> {
    match option_count {
        0..=2 => None,
        3..=5 => Some(Duration::from_millis(500)),
        _ => Some(Duration::from_secs(1)),
    }
}

/// Markers for `option_count` options, in order.
pub fn assign_markers(option_count: usize) -> Result<Vec<Marker>> {
    if option_count == 0 {
        return Err(Error::MenuConfig("a choice needs at least one option".to_string()));
    }
    if option_count > MAX_CHOICES {
        return Err(Error::MenuConfig(format!(
            "{option_count} options given, at most {MAX_CHOICES} can be offered"
        )));
    }
    Ok((0..option_count).filter_map(Marker::for_position).collect())
}

fn render(options: &[String], markers: &[Marker], timeout: Duration) -> Embed {
    let description = markers
        .iter()
        .zip(options)
        .map(|(marker, option)| format!("{marker} {option}"))
        .collect::<Vec<_>>()
        .join("\n");

    Embed::new(description)
        .author("Select which option")
        .footer(format!("You have {} seconds", timeout.as_secs()))
}

/// Reaction-based menu for picking one of up to nine options.
pub struct ChoicePrompt {
    messenger: Arc<dyn MessagingPort>,
    hub: Arc<ReactionHub>,
}

impl ChoicePrompt {
    pub fn new(messenger: Arc<dyn MessagingPort>, hub: Arc<ReactionHub>) -> Self {
        Self { messenger, hub }
    }

    /// Ask `owner` (the invoker when `None`) to pick one of `options`.
    ///
    /// Returns `Ok(None)` when nobody chose within `timeout`. The prompt message is
    /// deleted either way.
    pub async fn ask(
        &self,
        ctx: &MenuContext,
        options: &[String],
        owner: Option<UserId>,
        timeout: Duration,
    ) -> Result<Option<String>> {
        let markers = assign_markers(options.len())?;
        if timeout.is_zero() {
            return Err(Error::InvalidTimeout);
        }
        let owner = owner.unwrap_or(ctx.invoker);

        let body = MessageBody::embed(render(options, &markers, timeout));
        let msg = self.messenger.send(ctx.chat, &body).await?;

        let mut session = match Session::open(self.hub.clone(), msg, owner, timeout) {
            Ok(session) => session,
            Err(e) => {
                discard(self.messenger.as_ref(), msg).await;
                return Err(e);
            }
        };

        let attaching = spawn_affordances(
            self.messenger.clone(),
            msg,
            markers.clone(),
            attach_pacing(options.len()),
        );

        let outcome = session
            .await_event(|reaction| markers.contains(&reaction.marker))
            .await;

        session.close();
        attaching.abort();
        discard(self.messenger.as_ref(), msg).await;

        match outcome? {
            SessionEvent::Reaction(reaction) => Ok(reaction
                .marker
                .position()
                .and_then(|i| options.get(i).cloned())),
            SessionEvent::TimedOut => {
                tracing::debug!(message = %msg, owner = owner.0, "choice prompt timed out");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatId, MessageId, MessageRef};
    use crate::menu::testing::{react, wait_for_session, FakeMessenger};

    const OWNER: UserId = UserId(42);
    const STRANGER: UserId = UserId(7);

    fn ctx() -> MenuContext {
        MenuContext {
            chat: ChatId(100),
            invoker: OWNER,
        }
    }

    fn first_message() -> MessageRef {
        MessageRef::new(ChatId(100), MessageId(1))
    }

    fn options(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("option {i}")).collect()
    }

    #[test]
    fn pacing_scales_with_option_count() {
        assert_eq!(attach_pacing(1), None);
        assert_eq!(attach_pacing(2), None);
        assert_eq!(attach_pacing(3), Some(Duration::from_millis(500)));
        assert_eq!(attach_pacing(5), Some(Duration::from_millis(500)));
        assert_eq!(attach_pacing(6), Some(Duration::from_secs(1)));
        assert_eq!(attach_pacing(9), Some(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn oversized_option_set_is_rejected_before_rendering() {
        let messenger = FakeMessenger::new();
        let prompt = ChoicePrompt::new(messenger.clone(), Arc::new(ReactionHub::new()));

        let err = prompt
            .ask(&ctx(), &options(10), None, DEFAULT_CHOICE_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MenuConfig(_)));

        let err = prompt
            .ask(&ctx(), &[], None, DEFAULT_CHOICE_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MenuConfig(_)));
        assert!(messenger.sends.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn heads_or_tails_returns_the_owner_pick() {
        let messenger = FakeMessenger::new();
        let hub = Arc::new(ReactionHub::new());
        let prompt = ChoicePrompt::new(messenger.clone(), hub.clone());
        let coin = vec!["Heads".to_string(), "Tails".to_string()];

        let task = tokio::spawn(async move {
            prompt
                .ask(&ctx(), &coin, Some(OWNER), DEFAULT_CHOICE_TIMEOUT)
                .await
        });

        wait_for_session(&hub, first_message()).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(react(&hub, first_message(), OWNER, Marker::keycap(2).unwrap()));

        let picked = task.await.unwrap().unwrap();
        assert_eq!(picked.as_deref(), Some("Tails"));
        assert_eq!(*messenger.deletes.lock().unwrap(), vec![first_message()]);
        assert_eq!(hub.active(), 0);

        let sent = messenger.sends.lock().unwrap()[0].1.clone();
        let embed = sent.embed.unwrap();
        assert!(embed.description.contains("Heads"));
        assert_eq!(embed.footer.as_deref(), Some("You have 30 seconds"));
    }

    #[tokio::test(start_paused = true)]
    async fn every_size_resolves_to_marked_option_and_ignores_strangers() {
        for n in 1..=MAX_CHOICES {
            let messenger = FakeMessenger::new();
            let hub = Arc::new(ReactionHub::new());
            let prompt = ChoicePrompt::new(messenger.clone(), hub.clone());
            let opts = options(n);
            let expected = opts[n - 1].clone();

            let task = tokio::spawn(async move {
                prompt
                    .ask(&ctx(), &opts, None, DEFAULT_CHOICE_TIMEOUT)
                    .await
            });

            wait_for_session(&hub, first_message()).await;
            let last = Marker::for_position(n - 1).unwrap();
            react(&hub, first_message(), STRANGER, Marker::keycap(1).unwrap());
            react(&hub, first_message(), OWNER, last);
            // Extra reactions after the first qualifying one are never consumed.
            react(&hub, first_message(), OWNER, Marker::keycap(1).unwrap());

            let picked = task.await.unwrap().unwrap();
            assert_eq!(picked, Some(expected), "option count {n}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn markers_outside_the_assigned_set_are_ignored() {
        let messenger = FakeMessenger::new();
        let hub = Arc::new(ReactionHub::new());
        let prompt = ChoicePrompt::new(messenger.clone(), hub.clone());

        let task = tokio::spawn(async move {
            prompt
                .ask(&ctx(), &options(3), None, Duration::from_secs(10))
                .await
        });

        wait_for_session(&hub, first_message()).await;
        react(&hub, first_message(), OWNER, Marker::keycap(4).unwrap());
        react(&hub, first_message(), OWNER, Marker::Nav(crate::menu::Nav::Next));

        assert_eq!(task.await.unwrap().unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_returns_none_and_deletes_prompt() {
        for n in 1..=MAX_CHOICES {
            let messenger = FakeMessenger::new();
            let hub = Arc::new(ReactionHub::new());
            let prompt = ChoicePrompt::new(messenger.clone(), hub.clone());

            let picked = prompt
                .ask(&ctx(), &options(n), None, DEFAULT_CHOICE_TIMEOUT)
                .await
                .unwrap();

            assert_eq!(picked, None);
            assert_eq!(*messenger.deletes.lock().unwrap(), vec![first_message()]);
            assert_eq!(hub.active(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn attaches_markers_in_order_while_waiting() {
        let messenger = FakeMessenger::new();
        let hub = Arc::new(ReactionHub::new());
        let prompt = ChoicePrompt::new(messenger.clone(), hub.clone());

        let task = tokio::spawn(async move {
            prompt
                .ask(&ctx(), &options(4), None, DEFAULT_CHOICE_TIMEOUT)
                .await
        });

        wait_for_session(&hub, first_message()).await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(
            messenger.added_markers(),
            (1..=4).filter_map(Marker::keycap).collect::<Vec<_>>()
        );

        react(&hub, first_message(), OWNER, Marker::keycap(3).unwrap());
        assert_eq!(task.await.unwrap().unwrap().as_deref(), Some("option 3"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_marker_attachment_does_not_affect_the_wait() {
        let messenger = FakeMessenger::new();
        *messenger.fail_reactions.lock().unwrap() = true;
        let hub = Arc::new(ReactionHub::new());
        let prompt = ChoicePrompt::new(messenger.clone(), hub.clone());

        let task = tokio::spawn(async move {
            prompt
                .ask(&ctx(), &options(6), None, DEFAULT_CHOICE_TIMEOUT)
                .await
        });

        wait_for_session(&hub, first_message()).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        react(&hub, first_message(), OWNER, Marker::keycap(6).unwrap());

        assert_eq!(task.await.unwrap().unwrap().as_deref(), Some("option 6"));
        assert!(messenger.added_markers().is_empty());
        // The first rejection ends the attachment sequence.
        assert_eq!(*messenger.add_attempts.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_owner_overrides_the_invoker() {
        let messenger = FakeMessenger::new();
        let hub = Arc::new(ReactionHub::new());
        let prompt = ChoicePrompt::new(messenger.clone(), hub.clone());

        let task = tokio::spawn(async move {
            prompt
                .ask(&ctx(), &options(3), Some(STRANGER), DEFAULT_CHOICE_TIMEOUT)
                .await
        });

        wait_for_session(&hub, first_message()).await;
        react(&hub, first_message(), OWNER, Marker::keycap(1).unwrap());
        tokio::task::yield_now().await;
        react(&hub, first_message(), STRANGER, Marker::keycap(2).unwrap());

        assert_eq!(task.await.unwrap().unwrap().as_deref(), Some("option 2"));
    }

    #[tokio::test(start_paused = true)]
    async fn second_prompt_on_busy_message_is_rejected() {
        let messenger = FakeMessenger::new();
        let hub = Arc::new(ReactionHub::new());
        // Squat on the message id the prompt is about to get.
        let _squatter =
            Session::open(hub.clone(), first_message(), STRANGER, DEFAULT_CHOICE_TIMEOUT)
                .unwrap();
        let prompt = ChoicePrompt::new(messenger.clone(), hub.clone());

        let err = prompt
            .ask(&ctx(), &options(2), None, DEFAULT_CHOICE_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionActive(_)));
        assert_eq!(*messenger.deletes.lock().unwrap(), vec![first_message()]);
    }
}
