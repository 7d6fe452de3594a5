//! Typed gateway events.
//!
//! The gateway delivers named dispatches with a JSON payload.
//! [`GatewayEvent::from_raw`] turns them into a closed set of variants; names
//! the library does not model, or payloads that fail to deserialize, are kept
//! as [`GatewayEvent::Unknown`] with the raw JSON.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entities::{Channel, Message, Snowflake};

/// Dispatch name of a created message.
pub const MESSAGE_CREATE: &str = "MESSAGE_CREATE";

/// Dispatch name of a thread membership update.
pub const THREAD_MEMBER_UPDATE: &str = "THREAD_MEMBER_UPDATE";

/// Discriminant of a [`GatewayEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MessageCreated,
    ThreadMemberUpdated,
    Unknown,
}

/// A message was posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCreatedEvent {
    pub message: Message,
}

/// A user's membership in a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMember {
    pub thread_id: Snowflake,
    pub user_id: Snowflake,
    /// ISO-8601 timestamp as sent by the gateway.
    pub joined_at: String,
    #[serde(default)]
    pub flags: u32,
}

/// The current user's thread membership changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMemberUpdatedEvent {
    pub thread_member: ThreadMember,
    pub thread: Channel,
}

/// A dispatch this library does not model.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownEvent {
    pub event_name: String,
    pub json: serde_json::Value,
}

/// An inbound gateway event.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    MessageCreated(MessageCreatedEvent),
    ThreadMemberUpdated(ThreadMemberUpdatedEvent),
    Unknown(UnknownEvent),
}

impl GatewayEvent {
    /// Maps a named raw dispatch to its typed event.
    pub fn from_raw(name: &str, payload: serde_json::Value) -> Self {
        let parsed = match name {
            MESSAGE_CREATE => serde_json::from_value::<Message>(payload.clone())
                .map(|message| Self::MessageCreated(MessageCreatedEvent { message })),
            THREAD_MEMBER_UPDATE => serde_json::from_value(payload.clone())
                .map(Self::ThreadMemberUpdated),
            _ => return Self::unknown(name, payload),
        };

        parsed.unwrap_or_else(|e| {
            debug!(event = name, error = %e, "Payload did not match, keeping raw");
            Self::unknown(name, payload)
        })
    }

    fn unknown(name: &str, json: serde_json::Value) -> Self {
        Self::Unknown(UnknownEvent {
            event_name: name.to_string(),
            json,
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::MessageCreated(_) => EventKind::MessageCreated,
            Self::ThreadMemberUpdated(_) => EventKind::ThreadMemberUpdated,
            Self::Unknown(_) => EventKind::Unknown,
        }
    }

    /// The dispatch name this event was created from.
    pub fn name(&self) -> &str {
        match self {
            Self::MessageCreated(_) => MESSAGE_CREATE,
            Self::ThreadMemberUpdated(_) => THREAD_MEMBER_UPDATE,
            Self::Unknown(event) => &event.event_name,
        }
    }
}

impl From<Message> for GatewayEvent {
    fn from(message: Message) -> Self {
        Self::MessageCreated(MessageCreatedEvent { message })
    }
}
