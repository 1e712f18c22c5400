use std::{sync::Arc, time::Duration};

use crate::{
    domain::{MessageRef, UserId},
    errors::Error,
    menu::{
        discard,
        hub::ReactionHub,
        marker::{Marker, Nav},
        session::{Session, SessionEvent},
        spawn_affordances, MenuContext,
    },
    messaging::{
        port::MessagingPort,
        types::{Embed, MessageBody, GREEN},
    },
    Result,
};

pub const PAGE_SIZE: usize = 20;
pub const DEFAULT_BROWSE_TIMEOUT: Duration = Duration::from_secs(60);
pub const INACTIVE_PLACEHOLDER: &str = "Menu Inactive";

const NAV_PACING: Duration = Duration::from_secs(1);

/// One line of a browsable listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub label: String,
    pub url: Option<String>,
}

impl Entry {
    pub fn new(label: impl Into<String>, url: Option<String>) -> Self {
        Self {
            label: label.into(),
            url,
        }
    }

    fn line(&self) -> String {
        match &self.url {
            Some(url) => {
                let label = self.label.replace('[', "\\[").replace(']', "\\]");
                format!("• [{label}]({url})")
            }
            None => format!("• {}", self.label),
        }
    }
}

/// Split `entries` into pages of at most `page_size`, keeping order and the short tail page.
pub fn paginate(entries: Vec<Entry>, page_size: usize) -> Vec<Vec<Entry>> {
    let page_size = page_size.max(1);
    let mut pages = Vec::with_capacity(entries.len().div_ceil(page_size));
    let mut iter = entries.into_iter().peekable();
    while iter.peek().is_some() {
        pages.push(iter.by_ref().take(page_size).collect());
    }
    pages
}

/// The listing, paginated once when the browser opens.
#[derive(Clone, Debug)]
pub struct PageSet {
    title: Option<String>,
    pages: Vec<Vec<Entry>>,
    total: usize,
}

impl PageSet {
    pub fn new(title: Option<String>, entries: Vec<Entry>) -> Self {
        let total = entries.len();
        Self {
            title,
            pages: paginate(entries, PAGE_SIZE),
            total,
        }
    }

    /// Number of renderable pages; an empty listing still renders one (empty) page.
    pub fn page_count(&self) -> usize {
        self.pages.len().max(1)
    }

    pub fn needs_navigation(&self) -> bool {
        self.total > PAGE_SIZE
    }

    pub fn page(&self, index: usize) -> &[Entry] {
        self.pages.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn render(&self, index: usize) -> Embed {
        let description = if self.total == 0 {
            "Nothing here yet.".to_string()
        } else {
            self.page(index)
                .iter()
                .map(Entry::line)
                .collect::<Vec<_>>()
                .join("\n")
        };

        let mut embed = Embed::new(description)
            .color(GREEN)
            .footer(format!("Page {}/{}", index + 1, self.page_count()));
        if let Some(title) = &self.title {
            embed = embed.author(title.clone());
        }
        embed
    }
}

/// Current page. Navigation clamps at both ends; it never wraps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageCursor {
    index: usize,
    count: usize,
}

impl PageCursor {
    pub fn new(count: usize) -> Self {
        Self {
            index: 0,
            count: count.max(1),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Apply `nav`; returns whether the page changed.
    pub fn apply(&mut self, nav: Nav) -> bool {
        let next = match nav {
            Nav::Home => 0,
            Nav::Previous => self.index.saturating_sub(1),
            Nav::Next => (self.index + 1).min(self.count - 1),
        };
        let changed = next != self.index;
        self.index = next;
        changed
    }
}

/// Reaction-driven browser over a label/url listing.
pub struct Browser {
    messenger: Arc<dyn MessagingPort>,
    hub: Arc<ReactionHub>,
}

impl Browser {
    pub fn new(messenger: Arc<dyn MessagingPort>, hub: Arc<ReactionHub>) -> Self {
        Self { messenger, hub }
    }

    /// Show `entries` to `owner` (the invoker when `None`) until `idle_timeout` passes
    /// without a navigation reaction.
    ///
    /// Ends quietly when the message is deleted mid-session.
    pub async fn browse(
        &self,
        ctx: &MenuContext,
        title: Option<&str>,
        entries: Vec<Entry>,
        owner: Option<UserId>,
        idle_timeout: Duration,
    ) -> Result<()> {
        if idle_timeout.is_zero() {
            return Err(Error::InvalidTimeout);
        }
        let owner = owner.unwrap_or(ctx.invoker);
        let pages = PageSet::new(title.map(str::to_string), entries);
        let mut cursor = PageCursor::new(pages.page_count());

        let msg = self
            .messenger
            .send(ctx.chat, &MessageBody::embed(pages.render(0)))
            .await?;

        let mut session = match Session::open(self.hub.clone(), msg, owner, idle_timeout) {
            Ok(session) => session,
            Err(e) => {
                discard(self.messenger.as_ref(), msg).await;
                return Err(e);
            }
        };

        let attaching = pages.needs_navigation().then(|| {
            spawn_affordances(
                self.messenger.clone(),
                msg,
                Nav::ALL.into_iter().map(Marker::Nav).collect(),
                Some(NAV_PACING),
            )
        });

        let result = self.run(&mut session, &pages, &mut cursor).await;

        session.close();
        if let Some(handle) = attaching {
            handle.abort();
            if !result.as_ref().is_err_and(Error::is_message_gone) {
                if let Err(e) = self.messenger.clear_affordances(msg).await {
                    tracing::debug!(message = %msg, error = %e, "could not clear browser navigation");
                }
            }
        }

        match result {
            Err(e) if e.is_message_gone() => {
                tracing::debug!(message = %msg, "browser message deleted, ending session");
                Ok(())
            }
            other => other,
        }
    }

    async fn run(
        &self,
        session: &mut Session,
        pages: &PageSet,
        cursor: &mut PageCursor,
    ) -> Result<()> {
        let msg = session.anchor();
        let owner = session.owner();

        loop {
            self.reset_owner_reactions(msg, owner).await?;

            let reaction = match session.await_event(|r| r.marker.nav().is_some()).await? {
                SessionEvent::TimedOut => {
                    let body = MessageBody::embed(pages.render(cursor.index()))
                        .with_content(INACTIVE_PLACEHOLDER);
                    self.messenger.edit(msg, &body).await?;
                    return Ok(());
                }
                SessionEvent::Reaction(reaction) => reaction,
            };

            let Some(nav) = reaction.marker.nav() else {
                continue;
            };
            if cursor.apply(nav) {
                let body = MessageBody::embed(pages.render(cursor.index()));
                self.messenger.edit(msg, &body).await?;
            }
        }
    }

    /// Drop the owner's reaction from every affordance that has been clicked, so a
    /// backlog of rapid clicks cannot pile up on one marker.
    async fn reset_owner_reactions(&self, msg: MessageRef, owner: UserId) -> Result<()> {
        if !self.messenger.capabilities().reports_reaction_counts {
            return Ok(());
        }
        let live = match self.messenger.reactions(msg).await {
            Ok(live) => live,
            Err(e) if e.is_message_gone() => return Err(e),
            Err(e) => {
                tracing::warn!(message = %msg, error = %e, "could not read menu reactions");
                return Ok(());
            }
        };

        for state in live
            .iter()
            .filter(|state| state.count > 1 && state.users.contains(&owner))
        {
            match self
                .messenger
                .remove_reaction(msg, state.marker, owner)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_message_gone() => return Err(e),
                Err(e) => {
                    tracing::warn!(message = %msg, marker = %state.marker, error = %e, "could not remove menu reaction");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatId, MessageId};
    use crate::menu::testing::{react, wait_for_session, FakeMessenger};
    use crate::messaging::types::ReactionCount;

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

    fn entries(n: usize) -> Vec<Entry> {
        (0..n)
            .map(|i| {
                let url = (i % 2 == 0).then(|| format!("https://example.com/{i}"));
                Entry::new(format!("entry {i}"), url)
            })
            .collect()
    }

    #[test]
    fn pagination_preserves_order_and_page_bounds() {
        for n in 0..=65 {
            let original = entries(n);
            let pages = paginate(original.clone(), PAGE_SIZE);

            assert_eq!(pages.len(), n.div_ceil(PAGE_SIZE), "n = {n}");
            assert!(pages.iter().all(|p| !p.is_empty() && p.len() <= PAGE_SIZE));
            assert_eq!(pages.concat(), original);
        }
    }

    #[test]
    fn twenty_entries_fit_one_page_twenty_one_need_two() {
        let twenty = PageSet::new(None, entries(20));
        assert_eq!(twenty.page_count(), 1);
        assert!(!twenty.needs_navigation());

        let twenty_one = PageSet::new(None, entries(21));
        assert_eq!(twenty_one.page_count(), 2);
        assert!(twenty_one.needs_navigation());
        assert_eq!(twenty_one.page(1).len(), 1);
    }

    #[test]
    fn renders_plain_and_linked_entries() {
        let pages = PageSet::new(
            Some("Medium Links".to_string()),
            vec![
                Entry::new("A", None),
                Entry::new("B", Some("http://x".to_string())),
            ],
        );
        let embed = pages.render(0);
        assert_eq!(embed.description, "• A\n• [B](http://x)");
        assert_eq!(embed.footer.as_deref(), Some("Page 1/1"));
        assert_eq!(embed.author.as_deref(), Some("Medium Links"));
        assert_eq!(embed.color, Some(GREEN));
    }

    #[test]
    fn cursor_clamps_at_both_ends() {
        let mut cursor = PageCursor::new(3);
        assert!(!cursor.apply(Nav::Previous));
        assert_eq!(cursor.index(), 0);
        assert!(cursor.apply(Nav::Next));
        assert!(cursor.apply(Nav::Next));
        assert!(!cursor.apply(Nav::Next));
        assert_eq!(cursor.index(), 2);
        assert!(cursor.apply(Nav::Home));
        assert_eq!(cursor.index(), 0);
        assert!(!cursor.apply(Nav::Home));

        let mut single = PageCursor::new(0);
        assert!(!single.apply(Nav::Next));
        assert_eq!(single.index(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_marks_menu_inactive() {
        let messenger = FakeMessenger::new();
        let hub = Arc::new(ReactionHub::new());
        let browser = Browser::new(messenger.clone(), hub.clone());

        let started = tokio::time::Instant::now();
        browser
            .browse(
                &ctx(),
                None,
                vec![
                    Entry::new("A", None),
                    Entry::new("B", Some("http://x".to_string())),
                ],
                Some(OWNER),
                DEFAULT_BROWSE_TIMEOUT,
            )
            .await
            .unwrap();

        assert!(started.elapsed() >= DEFAULT_BROWSE_TIMEOUT);
        assert!(started.elapsed() < Duration::from_secs(61));
        let last = messenger.last_edit().unwrap();
        assert_eq!(last.content.as_deref(), Some(INACTIVE_PLACEHOLDER));
        assert_eq!(last.embed.unwrap().description, "• A\n• [B](http://x)");
        assert_eq!(hub.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_affordances_only_when_listing_overflows() {
        for (n, expected) in [(20, vec![]), (21, Nav::ALL.map(Marker::Nav).to_vec())] {
            let messenger = FakeMessenger::new();
            let hub = Arc::new(ReactionHub::new());
            let browser = Browser::new(messenger.clone(), hub.clone());

            browser
                .browse(&ctx(), None, entries(n), None, DEFAULT_BROWSE_TIMEOUT)
                .await
                .unwrap();

            assert_eq!(messenger.added_markers(), expected, "n = {n}");
        }
    }

    #[test]
    fn brackets_in_linked_labels_are_escaped() {
        let entry = Entry::new("[Draft] notes", Some("https://x.example".to_string()));
        assert_eq!(entry.line(), "• [\\[Draft\\] notes](https://x.example)");
        assert_eq!(Entry::new("[plain]", None).line(), "• [plain]");
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_is_cleared_when_the_session_ends() {
        for (n, expected) in [(20, vec![]), (21, vec![first_message()])] {
            let messenger = FakeMessenger::new();
            let hub = Arc::new(ReactionHub::new());
            let browser = Browser::new(messenger.clone(), hub.clone());

            browser
                .browse(&ctx(), None, entries(n), None, DEFAULT_BROWSE_TIMEOUT)
                .await
                .unwrap();

            assert_eq!(*messenger.cleared.lock().unwrap(), expected, "n = {n}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn skips_reaction_reads_when_counts_are_not_reported() {
        let messenger = FakeMessenger::without_reaction_counts();
        let hub = Arc::new(ReactionHub::new());
        let browser = Browser::new(messenger.clone(), hub.clone());

        let task = tokio::spawn(async move {
            browser
                .browse(&ctx(), None, entries(45), None, DEFAULT_BROWSE_TIMEOUT)
                .await
        });

        wait_for_session(&hub, first_message()).await;
        react(&hub, first_message(), OWNER, Marker::Nav(Nav::Next));
        task.await.unwrap().unwrap();

        assert_eq!(messenger.edit_footers()[0], "Page 2/3");
        assert_eq!(*messenger.reaction_reads.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn owner_navigates_pages_with_clamping() {
        let messenger = FakeMessenger::new();
        let hub = Arc::new(ReactionHub::new());
        let browser = Browser::new(messenger.clone(), hub.clone());

        let task = tokio::spawn(async move {
            browser
                .browse(&ctx(), None, entries(45), None, DEFAULT_BROWSE_TIMEOUT)
                .await
        });

        wait_for_session(&hub, first_message()).await;
        for (user, nav) in [
            (OWNER, Nav::Next),
            (STRANGER, Nav::Next),
            (OWNER, Nav::Next),
            (OWNER, Nav::Next),
            (OWNER, Nav::Previous),
            (OWNER, Nav::Home),
        ] {
            react(&hub, first_message(), user, Marker::Nav(nav));
        }

        task.await.unwrap().unwrap();

        assert_eq!(
            messenger.edit_footers(),
            vec!["Page 2/3", "Page 3/3", "Page 2/3", "Page 1/3", "Page 1/3"]
        );
        assert_eq!(
            messenger.last_edit().unwrap().content.as_deref(),
            Some(INACTIVE_PLACEHOLDER)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn each_navigation_rearms_the_idle_timeout() {
        let messenger = FakeMessenger::new();
        let hub = Arc::new(ReactionHub::new());
        let browser = Browser::new(messenger.clone(), hub.clone());
        let started = tokio::time::Instant::now();

        let task = tokio::spawn(async move {
            browser
                .browse(&ctx(), None, entries(30), None, DEFAULT_BROWSE_TIMEOUT)
                .await
        });

        wait_for_session(&hub, first_message()).await;
        tokio::time::sleep(Duration::from_secs(50)).await;
        react(&hub, first_message(), OWNER, Marker::Nav(Nav::Next));

        task.await.unwrap().unwrap();
        assert!(started.elapsed() >= Duration::from_secs(110));
    }

    #[tokio::test(start_paused = true)]
    async fn strips_owner_duplicate_reactions_before_waiting() {
        let messenger = FakeMessenger::new();
        *messenger.live_reactions.lock().unwrap() = vec![
            ReactionCount {
                marker: Marker::Nav(Nav::Next),
                count: 2,
                users: vec![UserId(1), OWNER],
            },
            ReactionCount {
                marker: Marker::Nav(Nav::Home),
                count: 1,
                users: vec![UserId(1)],
            },
            ReactionCount {
                marker: Marker::Nav(Nav::Previous),
                count: 2,
                users: vec![UserId(1), STRANGER],
            },
        ];
        let hub = Arc::new(ReactionHub::new());
        let browser = Browser::new(messenger.clone(), hub.clone());

        browser
            .browse(&ctx(), None, entries(25), None, DEFAULT_BROWSE_TIMEOUT)
            .await
            .unwrap();

        assert_eq!(
            *messenger.removed.lock().unwrap(),
            vec![(first_message(), Marker::Nav(Nav::Next), OWNER)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deleted_message_ends_session_quietly() {
        let messenger = FakeMessenger::new();
        let hub = Arc::new(ReactionHub::new());
        let browser = Browser::new(messenger.clone(), hub.clone());

        let task = tokio::spawn(async move {
            browser
                .browse(&ctx(), None, entries(45), None, DEFAULT_BROWSE_TIMEOUT)
                .await
        });

        wait_for_session(&hub, first_message()).await;
        messenger.mark_gone(first_message());
        react(&hub, first_message(), OWNER, Marker::Nav(Nav::Next));

        task.await.unwrap().unwrap();
        assert_eq!(messenger.edit_count(), 0);
        assert_eq!(hub.active(), 0);
    }
}
