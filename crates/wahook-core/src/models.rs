//! Wire-format payload types and the queued envelope wrapper.
//!
//! The JSON layout here is the external contract of the gateway: payloads are
//! delivered to the downstream sink verbatim, and envelopes are what lives in
//! the durable queue. Field names stay camelCase so a queue written by an
//! older gateway process remains readable.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, Result};

/// Identifier of one logical WhatsApp session.
///
/// Events and heartbeats are always scoped to a session; the delivery
/// pipeline treats it as an opaque string and forwards it in the
/// `X-Session-ID` header.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Event taxonomy tag carried in every webhook payload.
///
/// The closed set matches the events the protocol translator produces;
/// `Custom` covers producer-defined tags without widening the enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Incoming or outgoing chat message.
    Message,
    /// Delivery/read marker for previously sent messages.
    Receipt,
    /// Contact presence update (online, last seen).
    Presence,
    /// Typing indicator (composing/paused).
    Typing,
    /// Session connection lifecycle transition.
    Connection,
    /// History synchronisation progress.
    HistorySync,
    /// Contact display-name change.
    PushName,
    /// Producer-defined event tag outside the fixed taxonomy.
    Custom(String),
}

impl EventKind {
    /// Returns the string tag used on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Message => "message",
            Self::Receipt => "receipt",
            Self::Presence => "presence",
            Self::Typing => "typing",
            Self::Connection => "connection",
            Self::HistorySync => "history_sync",
            Self::PushName => "push_name",
            Self::Custom(tag) => tag,
        }
    }

    /// Whether the tag is empty (only possible for `Custom`).
    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for EventKind {
    fn from(tag: &str) -> Self {
        match tag {
            "message" => Self::Message,
            "receipt" => Self::Receipt,
            "presence" => Self::Presence,
            "typing" => Self::Typing,
            "connection" => Self::Connection,
            "history_sync" => Self::HistorySync,
            "push_name" => Self::PushName,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(tag: String) -> Self {
        Self::from(tag.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from(tag))
    }
}

/// Webhook payload delivered to the downstream sink.
///
/// `data` is an open mapping whose schema varies per event kind; the
/// pipeline never inspects it. Invariant: `event` and `session_id` are
/// never empty (checked by [`WebhookPayload::validate`] at the producer
/// boundary).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Event taxonomy tag.
    pub event: EventKind,

    /// Originating logical session.
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,

    /// Event-occurrence time, unix seconds, producer-assigned.
    pub timestamp: i64,

    /// Event-specific fields.
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl WebhookPayload {
    /// Creates a payload for the given event and session.
    pub fn new(
        event: EventKind,
        session_id: SessionId,
        timestamp: i64,
        data: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self { event, session_id, timestamp, data }
    }

    /// Checks the structural invariant: non-empty event tag and session id.
    pub fn validate(&self) -> Result<()> {
        if self.event.is_empty() {
            return Err(CoreError::InvalidPayload("event tag is empty".to_string()));
        }
        if self.session_id.is_empty() {
            return Err(CoreError::InvalidPayload("session id is empty".to_string()));
        }
        Ok(())
    }
}

/// Queue entry wrapping a payload with its retry bookkeeping.
///
/// An envelope is in exactly one place at any instant: the main queue, in
/// flight inside the worker, or the dead-letter list. `created_at` is set
/// once at enqueue time and never changes; `retries` increases by one per
/// failed delivery attempt and is reset to zero only by an administrative
/// requeue from the dead-letter list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedEnvelope {
    /// The wrapped webhook payload.
    pub payload: WebhookPayload,

    /// Failed delivery attempts so far.
    pub retries: u32,

    /// Enqueue time, unix seconds.
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl QueuedEnvelope {
    /// Wraps a payload into a fresh envelope with zero retries.
    pub fn new(payload: WebhookPayload, created_at: i64) -> Self {
        Self { payload, retries: 0, created_at }
    }
}

/// Extracted content of a chat message, as forwarded in `message` events.
///
/// Mirrors what the protocol layer extracts from the underlying library;
/// optional text fields are omitted from the wire when empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContent {
    /// Protocol message identifier.
    pub id: String,
    /// Sender JID.
    pub from: String,
    /// Destination chat JID.
    pub to: String,
    /// Content kind (text, image, video, audio, document, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Text body, when the message carries one.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
    /// Media caption.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub caption: String,
    /// Media download URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_url: String,
    /// Media MIME type.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_mime_type: String,
    /// Whether the chat is a group.
    pub is_group: bool,
    /// Whether the message was sent by this session.
    pub is_from_me: bool,
    /// Sender display name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub push_name: String,
    /// Group subject, for group chats.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group_name: String,
    /// Message timestamp, unix seconds.
    pub timestamp: i64,
    /// Reference to a quoted message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_message: Option<QuotedMessage>,
}

/// Reference to the message a reply quotes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotedMessage {
    /// Quoted message identifier.
    pub id: String,
    /// Participant who sent the quoted message.
    pub from: String,
}
