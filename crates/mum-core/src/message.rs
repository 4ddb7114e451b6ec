//! Chat messages - the unit stored in a channel log and broadcast to clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nick used for messages the relay itself emits (heartbeats).
pub const SERVER_NICK: &str = "server";

/// What a message records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// A line of chat text
    Msg,
    /// A nick entered the channel
    Join,
    /// A nick left the channel (explicitly or by timing out)
    Part,
}

impl MessageKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Msg => "msg",
            Self::Join => "join",
            Self::Part => "part",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable chat event.
///
/// Serializes as `{"nick":..,"type":..,"text":..,"timestamp":<epoch ms>}`.
/// Join and part events carry no text, so `text` is omitted for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub nick: String,

    #[serde(rename = "type")]
    pub kind: MessageKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(
        nick: impl Into<String>,
        kind: MessageKind,
        text: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            nick: nick.into(),
            kind,
            text,
            timestamp,
        }
    }

    /// Epoch milliseconds, the unit clients poll with.
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// True if this message was stamped strictly after `since` (epoch ms).
    #[must_use]
    pub fn is_newer_than(&self, since: i64) -> bool {
        self.timestamp_millis() > since
    }

    /// The human-readable log line for this event.
    ///
    /// `<alice> hi` for chat, `alice join` / `alice part` for presence.
    #[must_use]
    pub fn log_line(&self) -> String {
        match self.kind {
            MessageKind::Msg => {
                format!("<{}> {}", self.nick, self.text.as_deref().unwrap_or_default())
            }
            MessageKind::Join | MessageKind::Part => format!("{} {}", self.nick, self.kind),
        }
    }
}
