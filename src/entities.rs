//! Platform entities consumed by the command framework.
//!
//! These are plain data records handed over by the gateway and REST
//! collaborators. The framework never mutates them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Platform-wide unique identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snowflake(pub u64);

impl Snowflake {
    /// Parses a decimal id string.
    pub fn parse(s: &str) -> Option<Self> {
        s.parse::<u64>().ok().map(Self)
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Snowflake {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A platform account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    pub fn new(id: impl Into<Snowflake>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            bot: false,
        }
    }

    /// Returns the mention markup for this user.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// A user's membership in a guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user: User,
    pub guild_id: Snowflake,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
}

impl Member {
    pub fn new(user: User, guild_id: impl Into<Snowflake>) -> Self {
        Self {
            user,
            guild_id: guild_id.into(),
            nickname: None,
            roles: Vec::new(),
        }
    }

    /// Nickname if set, otherwise the username.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.user.username)
    }
}

/// A guild (server).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
    pub owner_id: Snowflake,
}

impl Guild {
    pub fn new(id: impl Into<Snowflake>, name: impl Into<String>, owner_id: impl Into<Snowflake>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner_id: owner_id.into(),
        }
    }
}

/// Channel flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    #[default]
    Text,
    Direct,
    Thread,
}

/// A channel. Guild channels carry their guild, direct channels do not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub kind: ChannelKind,
    #[serde(default)]
    pub guild: Option<Guild>,
}

impl Channel {
    /// Creates a text channel inside a guild.
    pub fn guild_text(id: impl Into<Snowflake>, name: impl Into<String>, guild: Guild) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ChannelKind::Text,
            guild: Some(guild),
        }
    }

    /// Creates a direct-message channel.
    pub fn direct(id: impl Into<Snowflake>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            kind: ChannelKind::Direct,
            guild: None,
        }
    }

    pub fn is_direct(&self) -> bool {
        self.kind == ChannelKind::Direct
    }

    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }
}

/// A received chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel: Channel,
    pub author: User,
    pub content: String,
    /// Users mentioned in the content, as resolved by the gateway.
    #[serde(default)]
    pub mentions: Vec<User>,
}

impl Message {
    pub fn new(id: impl Into<Snowflake>, channel: Channel, author: User, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            channel,
            author,
            content: content.into(),
            mentions: Vec::new(),
        }
    }

    pub fn with_mentions(mut self, mentions: Vec<User>) -> Self {
        self.mentions = mentions;
        self
    }

    pub fn guild(&self) -> Option<&Guild> {
        self.channel.guild.as_ref()
    }
}

/// A structured rich-content block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
    #[serde(default)]
    pub color: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }
}

/// A file to upload alongside a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Full outgoing-message configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBuilder {
    pub content: Option<String>,
    pub embed: Option<Embed>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Message this one replies to.
    pub reply_to: Option<Snowflake>,
    /// Suppress all mention pings in the content.
    #[serde(default)]
    pub suppress_mentions: bool,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embed = Some(embed);
        self
    }

    pub fn attachment(mut self, filename: impl Into<String>, data: Vec<u8>) -> Self {
        self.attachments.push(Attachment {
            filename: filename.into(),
            data,
        });
        self
    }

    pub fn reply_to(mut self, message_id: Snowflake) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn suppress_mentions(mut self, suppress: bool) -> Self {
        self.suppress_mentions = suppress;
        self
    }

    /// True if the builder would produce an empty message.
    pub fn is_empty(&self) -> bool {
        self.content.as_deref().map_or(true, str::is_empty)
            && self.embed.is_none()
            && self.attachments.is_empty()
    }
}
