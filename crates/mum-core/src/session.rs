//! Session domain entities and value objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::clock::elapsed;
use crate::{DomainError, DomainResult};

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Number of random bytes in a generated session id.
const SESSION_ID_BYTES: usize = 16;

/// Opaque identifier handed to a client on join.
///
/// Generated ids are 128 random bits from the thread-local CSPRNG,
/// hex-encoded (32 characters). Collisions are treated as impossible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an existing id string (e.g. one supplied by a client).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random session id.
    pub fn generate() -> Self {
        let bytes: [u8; SESSION_ID_BYTES] = rand::random();
        Self(hex::encode(bytes))
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a shortened display form (first 8 characters) for logs.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Nick
// ============================================================================

/// Longest nick accepted, in characters.
pub const MAX_NICK_LEN: usize = 50;

/// A validated nickname.
///
/// Up to [`MAX_NICK_LEN`] characters drawn from ASCII letters, digits,
/// `_`, `-`, `^` and `!`. Matching is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Nick(String);

impl Nick {
    /// Validates `raw` as a nickname.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidNick` if `raw` is empty, longer than
    /// [`MAX_NICK_LEN`], or contains a character outside the allowed set.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        if raw.is_empty() {
            return Err(DomainError::invalid_nick(raw, "empty"));
        }

        let len = raw.chars().count();
        if len > MAX_NICK_LEN {
            return Err(DomainError::invalid_nick(
                raw,
                format!("{len} characters (max {MAX_NICK_LEN})"),
            ));
        }

        if let Some(bad) = raw.chars().find(|c| !is_nick_char(*c)) {
            return Err(DomainError::invalid_nick(raw, format!("contains {bad:?}")));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

fn is_nick_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '^' | '!')
}

impl fmt::Display for Nick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Nick {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Nick {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

// ============================================================================
// Session
// ============================================================================

/// A live participant: an id, a nick and the instant of last activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub nick: Nick,
    pub last_active: DateTime<Utc>,
}

impl Session {
    /// Creates a session with a freshly generated id.
    pub fn new(nick: Nick, now: DateTime<Utc>) -> Self {
        Self::with_id(SessionId::generate(), nick, now)
    }

    pub fn with_id(id: SessionId, nick: Nick, now: DateTime<Utc>) -> Self {
        Self {
            id,
            nick,
            last_active: now,
        }
    }

    /// Records activity, resetting the expiry clock.
    pub fn poke(&mut self, now: DateTime<Utc>) {
        self.last_active = now;
    }

    /// Time since the last recorded activity (zero if `now` is earlier).
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        elapsed(self.last_active, now)
    }

    /// True once the session has been idle for strictly longer than `timeout`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.idle_for(now) > timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn test_generated_ids_are_hex_and_distinct() {
        let a = SessionId::generate();
        let b = SessionId::generate();

        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_session_id_short() {
        let id = SessionId::new("0123456789abcdef");
        assert_eq!(id.short(), "01234567");

        let tiny = SessionId::new("abc");
        assert_eq!(tiny.short(), "abc");
    }

    #[test]
    fn test_nick_accepts_allowed_charset() {
        for raw in ["alice", "Bob_2", "x-y", "^caret^", "bang!", "A", "_"] {
            let nick = Nick::parse(raw).unwrap();
            assert_eq!(nick.as_str(), raw);
        }
    }

    #[test]
    fn test_nick_length_boundary() {
        let fifty = "a".repeat(MAX_NICK_LEN);
        assert!(Nick::parse(&fifty).is_ok());

        let fifty_one = "a".repeat(MAX_NICK_LEN + 1);
        assert!(matches!(
            Nick::parse(&fifty_one),
            Err(DomainError::InvalidNick { .. })
        ));
    }

    #[test]
    fn test_nick_rejects_disallowed_characters() {
        for raw in ["two words", "semi;colon", "dot.nick", "tab\t", "ünï", "<b>"] {
            assert!(
                matches!(Nick::parse(raw), Err(DomainError::InvalidNick { .. })),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_nick_rejects_empty() {
        assert!(Nick::parse("").is_err());
    }

    #[test]
    fn test_session_poke_and_expiry() {
        let nick = Nick::parse("alice").unwrap();
        let mut session = Session::new(nick, at(0));
        let timeout = Duration::from_secs(60);

        assert!(!session.is_expired(at(60_000), timeout));
        assert!(session.is_expired(at(60_001), timeout));

        session.poke(at(50_000));
        assert!(!session.is_expired(at(110_000), timeout));
        assert!(session.is_expired(at(110_001), timeout));
    }

    #[test]
    fn test_idle_for_clamps_backwards_time() {
        let session = Session::new(Nick::parse("alice").unwrap(), at(10_000));
        assert_eq!(session.idle_for(at(5_000)), Duration::ZERO);
        assert_eq!(session.idle_for(at(12_500)), Duration::from_millis(2_500));
    }
}
