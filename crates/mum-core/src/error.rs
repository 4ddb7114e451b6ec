//! Domain-specific error types following panic-free policy.

use crate::SessionId;
use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Nickname failed length or character-set validation
    #[error("Invalid nick {nick:?}: {reason}")]
    InvalidNick { nick: String, reason: String },

    /// Another live session already holds this nickname
    #[error("Nick in use: {0}")]
    NickInUse(String),

    /// Session not found in registry
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: SessionId },

    /// A chat message must carry some text
    #[error("Message text must not be empty")]
    EmptyText,
}

impl DomainError {
    /// Creates an invalid-nick error.
    pub fn invalid_nick(nick: &str, reason: impl Into<String>) -> Self {
        Self::InvalidNick {
            nick: nick.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_display() {
        let err = DomainError::invalid_nick("a b", "contains ' '");
        assert_eq!(err.to_string(), "Invalid nick \"a b\": contains ' '");

        let err = DomainError::NickInUse("alice".to_string());
        assert_eq!(err.to_string(), "Nick in use: alice");

        let err = DomainError::SessionNotFound {
            session_id: SessionId::new("abc"),
        };
        assert_eq!(err.to_string(), "Session not found: abc");
    }
}
