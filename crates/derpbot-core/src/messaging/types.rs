use crate::{
    domain::{MessageRef, UserId},
    menu::marker::Marker,
};

/// Accent colour used by the link and menu embeds.
pub const GREEN: u32 = 0x0e8710;

/// Accent colour used by the coinflip embed.
pub const PURPLE: u32 = 0x6c3483;

/// Platform-neutral rich message. Text fields may use the `**bold**` and
/// `[label](url)` markdown subset; adapters render it natively.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Embed {
    pub author: Option<String>,
    pub description: String,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
    pub color: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

impl Embed {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

/// Outgoing message: plain content, an embed, or both.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageBody {
    pub content: Option<String>,
    pub embed: Option<Embed>,
}

impl MessageBody {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            embed: None,
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            content: None,
            embed: Some(embed),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// Raw reaction-add event as delivered by the adapter.
///
/// `emoji` is untyped on purpose: it is validated into a [`Marker`] when it
/// enters a menu session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionEvent {
    pub message: MessageRef,
    pub user: UserId,
    pub emoji: String,
}

/// Live state of one affordance on a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionCount {
    pub marker: Marker,
    /// Total reactions including the bot's own.
    pub count: u32,
    pub users: Vec<UserId>,
}

/// Capabilities / feature flags of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    /// Whether `reactions()` reports real per-user counts. Menus skip the
    /// per-iteration reaction reset when it does not.
    pub reports_reaction_counts: bool,
}
