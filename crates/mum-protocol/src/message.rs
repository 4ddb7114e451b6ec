//! Response bodies sent from the daemon to HTTP clients.

use mum_core::{Message, SessionId};
use serde::{Deserialize, Serialize};

/// `GET /who` - nicks of every live session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoResponse {
    pub nicks: Vec<String>,
}

/// `GET /join` - the new session's credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponse {
    pub id: SessionId,
    pub nick: String,
}

/// `GET /recv` - backlog newer than `since`, oldest first (possibly empty).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecvResponse {
    pub messages: Vec<Message>,
}

/// `{}` - the body of `/part` and `/send`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyResponse {}

/// Why a request was rejected with 400.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorReason {
    /// `/join` without a nick
    BadNick,
    /// `/join` whose nick was refused by the session registry
    NickInUse,
    /// `/recv` without `since`
    MissingSince,
    /// `/send` with an unknown session or no text
    NoSuchSession,
}

impl ErrorReason {
    /// The client-facing reason string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadNick => "Bad nick.",
            Self::NickInUse => "Nick in use",
            Self::MissingSince => "Must supply since parameter",
            Self::NoSuchSession => "No such session id",
        }
    }
}

/// `{"error": "<reason>"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<ErrorReason> for ErrorResponse {
    fn from(reason: ErrorReason) -> Self {
        Self {
            error: reason.as_str().to_string(),
        }
    }
}

/// Encodes one message for the `/update` stream: compact JSON plus `\n`.
///
/// # Errors
///
/// Returns the serializer error if the message cannot be encoded.
pub fn update_line(message: &Message) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use mum_core::MessageKind;

    #[test]
    fn test_error_reason_strings() {
        assert_eq!(ErrorReason::BadNick.as_str(), "Bad nick.");
        assert_eq!(ErrorReason::NickInUse.as_str(), "Nick in use");
        assert_eq!(
            ErrorReason::MissingSince.as_str(),
            "Must supply since parameter"
        );
        assert_eq!(ErrorReason::NoSuchSession.as_str(), "No such session id");
    }

    #[test]
    fn test_error_response_serialization() {
        let body = ErrorResponse::from(ErrorReason::NickInUse);
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"error":"Nick in use"}"#);
    }

    #[test]
    fn test_empty_response_is_empty_object() {
        assert_eq!(serde_json::to_string(&EmptyResponse {}).unwrap(), "{}");
    }

    #[test]
    fn test_join_response_serialization() {
        let body = JoinResponse {
            id: SessionId::new("abc123"),
            nick: "alice".to_string(),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"id":"abc123","nick":"alice"}"#);
    }

    #[test]
    fn test_update_line_is_newline_terminated() {
        let ts = DateTime::from_timestamp_millis(7).unwrap();
        let msg = Message::new("server", MessageKind::Msg, Some("<3".into()), ts);

        let line = update_line(&msg).unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let parsed: Message = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(parsed, msg);
    }
}
