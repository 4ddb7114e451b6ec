//! Query-string parameters accepted by each endpoint.
//!
//! Every field is optional at the wire level: presence checks are part of
//! each endpoint's validation, so a missing field must deserialize cleanly
//! rather than fail extraction. Handlers build these from the raw key/value
//! pairs with `from_pairs`, where a repeated key keeps its first value.

use mum_core::SessionId;
use serde::Deserialize;

/// `GET /join?nick=..`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinParams {
    pub nick: Option<String>,
}

impl JoinParams {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            nick: first_value(pairs, "nick"),
        }
    }

    /// The nick, if present and non-empty.
    pub fn nick(&self) -> Option<&str> {
        non_empty(self.nick.as_deref())
    }
}

/// `GET /part?id=..`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartParams {
    pub id: Option<String>,
}

impl PartParams {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            id: first_value(pairs, "id"),
        }
    }

    pub fn session_id(&self) -> Option<SessionId> {
        non_empty(self.id.as_deref()).map(SessionId::new)
    }
}

/// `GET /recv?since=..&id=..`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecvParams {
    pub id: Option<String>,
    pub since: Option<String>,
}

impl RecvParams {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            id: first_value(pairs, "id"),
            since: first_value(pairs, "since"),
        }
    }

    pub fn session_id(&self) -> Option<SessionId> {
        non_empty(self.id.as_deref()).map(SessionId::new)
    }

    /// The raw `since` value, if present and non-empty.
    pub fn since(&self) -> Option<&str> {
        non_empty(self.since.as_deref())
    }
}

/// `GET /send?id=..&text=..`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendParams {
    pub id: Option<String>,
    pub text: Option<String>,
}

impl SendParams {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            id: first_value(pairs, "id"),
            text: first_value(pairs, "text"),
        }
    }

    pub fn session_id(&self) -> Option<SessionId> {
        non_empty(self.id.as_deref()).map(SessionId::new)
    }

    pub fn text(&self) -> Option<&str> {
        non_empty(self.text.as_deref())
    }
}

/// The first value given for `key`, if any.
fn first_value(pairs: &[(String, String)], key: &str) -> Option<String> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Parses a `since` timestamp the way browsers' integer parsing does.
///
/// Leading whitespace and an optional sign are accepted, then the longest
/// run of decimal digits; anything after it is ignored (`"123abc"` is 123).
/// Values beyond `i64` saturate. Returns `None` when no digit is found.
pub fn parse_since(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, trimmed.get(1..).unwrap_or_default()),
        Some(b'+') => (false, trimmed.get(1..).unwrap_or_default()),
        _ => (false, trimmed),
    };

    let digits: Vec<i64> = rest
        .chars()
        .map_while(|c| c.to_digit(10))
        .map(i64::from)
        .collect();

    if digits.is_empty() {
        return None;
    }

    let magnitude = digits
        .into_iter()
        .fold(0_i64, |acc, d| acc.saturating_mul(10).saturating_add(d));

    Some(if negative { -magnitude } else { magnitude })
}
