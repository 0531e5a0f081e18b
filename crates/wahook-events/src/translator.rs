//! Protocol-event to webhook-payload translation.
//!
//! Inbound session events arrive as a closed tagged set; each variant maps
//! through its own pure builder to the `data` mapping of a wire payload.
//! Adding an event means adding a variant and its builder - there is no
//! central dispatcher to modify.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, error};
use wahook_core::{Clock, EventKind, MessageContent, QueuedEnvelope, SessionId, WebhookPayload};
use wahook_delivery::{QueueKeys, QueueStore};

/// Inbound event of one WhatsApp session, already extracted from the
/// underlying protocol library.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Chat message with extracted content.
    Message(MessageContent),
    /// Delivery/read marker.
    Receipt {
        /// Marker type (delivered, read, played, ...).
        receipt_type: String,
        /// Message ids the marker applies to.
        message_ids: Vec<String>,
        /// Chat the marker came from.
        chat: String,
        /// Marker timestamp, unix seconds.
        timestamp: i64,
    },
    /// Contact presence update.
    Presence {
        /// Contact JID.
        from: String,
        /// Whether the contact is currently available.
        available: bool,
        /// Last-seen time, unix seconds.
        last_seen: i64,
    },
    /// Typing indicator.
    Typing {
        /// Chat the indicator applies to.
        chat: String,
        /// Participant who is typing.
        sender: String,
        /// Composing (true) or paused (false).
        composing: bool,
        /// Audio recording indicator instead of text.
        audio: bool,
    },
    /// Session connected to the network.
    Connected,
    /// Session disconnected from the network.
    Disconnected,
    /// Session was logged out remotely.
    LoggedOut {
        /// Protocol-reported logout reason.
        reason: String,
    },
    /// History synchronisation progress.
    HistorySync {
        /// Sync phase reported by the protocol.
        sync_type: String,
        /// Progress percentage.
        progress: i32,
    },
    /// Contact display-name change.
    PushName {
        /// Contact JID.
        jid: String,
        /// New display name.
        push_name: String,
        /// Previous display name.
        old_name: String,
    },
}

impl SessionEvent {
    /// Taxonomy tag this event maps to.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Message(_) => EventKind::Message,
            Self::Receipt { .. } => EventKind::Receipt,
            Self::Presence { .. } => EventKind::Presence,
            Self::Typing { .. } => EventKind::Typing,
            Self::Connected | Self::Disconnected | Self::LoggedOut { .. } => EventKind::Connection,
            Self::HistorySync { .. } => EventKind::HistorySync,
            Self::PushName { .. } => EventKind::PushName,
        }
    }

    /// Builds the wire payload for this event.
    pub fn into_payload(self, session_id: SessionId, timestamp: i64) -> WebhookPayload {
        let kind = self.kind();
        let data = match self {
            Self::Message(content) => message_data(&content),
            Self::Receipt { receipt_type, message_ids, chat, timestamp } => {
                receipt_data(&receipt_type, &message_ids, &chat, timestamp)
            },
            Self::Presence { from, available, last_seen } => {
                presence_data(&from, available, last_seen)
            },
            Self::Typing { chat, sender, composing, audio } => {
                typing_data(&chat, &sender, composing, audio)
            },
            Self::Connected => status_data("connected", None),
            Self::Disconnected => status_data("disconnected", None),
            Self::LoggedOut { reason } => status_data("logged_out", Some(&reason)),
            Self::HistorySync { sync_type, progress } => history_sync_data(&sync_type, progress),
            Self::PushName { jid, push_name, old_name } => {
                push_name_data(&jid, &push_name, &old_name)
            },
        };
        WebhookPayload::new(kind, session_id, timestamp, data)
    }
}

fn message_data(content: &MessageContent) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("message".to_string(), json!(content));
    data
}

fn receipt_data(
    receipt_type: &str,
    message_ids: &[String],
    chat: &str,
    timestamp: i64,
) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("type".to_string(), json!(receipt_type));
    data.insert("messageId".to_string(), json!(message_ids));
    data.insert("from".to_string(), json!(chat));
    data.insert("timestamp".to_string(), json!(timestamp));
    data
}

fn presence_data(from: &str, available: bool, last_seen: i64) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("from".to_string(), json!(from));
    data.insert("available".to_string(), json!(available));
    data.insert("lastSeen".to_string(), json!(last_seen));
    data
}

fn typing_data(chat: &str, sender: &str, composing: bool, audio: bool) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("chat".to_string(), json!(chat));
    data.insert("sender".to_string(), json!(sender));
    data.insert("state".to_string(), json!(if composing { "composing" } else { "paused" }));
    data.insert("media".to_string(), json!(if audio { "audio" } else { "text" }));
    data
}

fn status_data(status: &str, reason: Option<&str>) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("status".to_string(), json!(status));
    if let Some(reason) = reason {
        data.insert("reason".to_string(), json!(reason));
    }
    data
}

fn history_sync_data(sync_type: &str, progress: i32) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("type".to_string(), json!(sync_type));
    data.insert("progress".to_string(), json!(progress));
    data
}

fn push_name_data(jid: &str, push_name: &str, old_name: &str) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("jid".to_string(), json!(jid));
    data.insert("pushName".to_string(), json!(push_name));
    data.insert("oldName".to_string(), json!(old_name));
    data
}

/// Translates session events into payloads and enqueues them.
///
/// One translator per live session. Enqueue failures are logged and the
/// event is lost; retry is the delivery worker's responsibility once an
/// envelope exists, never the producer's.
pub struct EventTranslator {
    session_id: SessionId,
    store: Arc<dyn QueueStore>,
    keys: QueueKeys,
    clock: Arc<dyn Clock>,
}

impl EventTranslator {
    /// Creates a translator for one session.
    pub fn new(
        session_id: SessionId,
        store: Arc<dyn QueueStore>,
        keys: QueueKeys,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { session_id, store, keys, clock }
    }

    /// Session this translator is scoped to.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Translates an event and pushes it onto the main queue.
    pub async fn publish(&self, event: SessionEvent) {
        let now = self.clock.unix_time();
        let payload = event.into_payload(self.session_id.clone(), now);

        if let Err(error) = payload.validate() {
            error!(session_id = %self.session_id, error = %error, "refusing invalid payload");
            return;
        }

        let envelope = QueuedEnvelope::new(payload, now);
        match self.store.push(&self.keys.main, &envelope).await {
            Ok(()) => debug!(
                event = %envelope.payload.event,
                session_id = %self.session_id,
                "webhook queued"
            ),
            Err(error) => error!(
                event = %envelope.payload.event,
                session_id = %self.session_id,
                error = %error,
                "failed to queue webhook"
            ),
        }
    }
}
