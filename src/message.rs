//! Message values carried through the relay
//!
//! Serialized field names follow the shape the browser client reads:
//! `id`, `from`, `body`, `timestamp`, `type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Origin of a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Arrived through the carrier callback
    Received,
    /// Sent by the local client; never enters the relay buffer
    Sent,
}

/// A single SMS as seen by the relay or a client transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "from", alias = "sender")]
    pub sender: String,
    pub body: String,
    #[serde(rename = "timestamp", alias = "receivedAt")]
    pub received_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

impl Message {
    /// Build an inbound message stamped with the current time.
    ///
    /// Uses the carrier's id when one was supplied, otherwise a generated one.
    pub fn received(sender: &str, body: &str, external_id: Option<&str>) -> Self {
        let now = Utc::now();
        let id = match external_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => fallback_id(now),
        };

        Self {
            id,
            sender: sender.to_string(),
            body: body.to_string(),
            received_at: now,
            kind: MessageKind::Received,
        }
    }

    /// Build a client-local entry for an outgoing message
    pub fn sent(body: &str) -> Self {
        let now = Utc::now();
        Self {
            id: fallback_id(now),
            sender: "You".to_string(),
            body: body.to_string(),
            received_at: now,
            kind: MessageKind::Sent,
        }
    }

    pub fn is_received(&self) -> bool {
        self.kind == MessageKind::Received
    }
}

static FALLBACK_SEQ: AtomicU64 = AtomicU64::new(0);

/// Millisecond timestamp plus a process-wide sequence number.
///
/// The timestamp alone collides when two messages land in the same tick.
pub fn fallback_id(at: DateTime<Utc>) -> String {
    let seq = FALLBACK_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", at.timestamp_millis(), seq)
}

/// Fields posted by the carrier's inbound webhook
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundSms {
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "Body")]
    pub body: Option<String>,
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
}

impl InboundSms {
    /// Turn the callback into a relay message, or `None` if sender or body is missing
    pub fn into_message(self) -> Option<Message> {
        let from = self.from.filter(|s| !s.is_empty())?;
        let body = self.body.filter(|s| !s.is_empty())?;
        Some(Message::received(&from, &body, self.message_sid.as_deref()))
    }
}
