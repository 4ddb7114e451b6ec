//! Relay actor commands and errors.
//!
//! This module defines the message types for communicating with the `RelayActor`:
//! - `RelayCommand`: Commands sent to the actor
//! - `RelayError`: Errors that can occur during relay operations
//!
//! All types are designed for async message passing and follow the panic-free policy.

use mum_core::{ChannelId, DomainError, Message, Session, SessionId};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::engine::{ChannelStats, QueryResolver, SubscriberId, SubscriberSink, TickReport};

// ============================================================================
// Relay Commands
// ============================================================================

/// Commands sent to the relay actor.
///
/// Request-response commands carry a oneshot sender for the reply;
/// fire-and-forget commands carry none.
#[derive(Debug)]
pub enum RelayCommand {
    /// Create a session and announce it on the default channel.
    ///
    /// # Errors
    /// - `DomainError::InvalidNick` if the nick fails validation
    /// - `DomainError::NickInUse` if a live session holds the nick
    Join {
        nick: String,
        respond_to: oneshot::Sender<Result<Session, DomainError>>,
    },

    /// Destroy a session and announce its departure.
    ///
    /// Replies with the destroyed session, or `None` for an unknown id.
    Part {
        session_id: SessionId,
        respond_to: oneshot::Sender<Option<Session>>,
    },

    /// Post a chat message as a session.
    ///
    /// # Errors
    /// - `DomainError::EmptyText` if the text is empty
    /// - `DomainError::SessionNotFound` if the session is not live
    Send {
        session_id: SessionId,
        text: String,
        respond_to: oneshot::Sender<Result<Message, DomainError>>,
    },

    /// Ask for messages newer than `since` on the default channel.
    ///
    /// There is no separate reply: `resolve` receives the messages, either
    /// immediately or when the query is flushed as stale.
    Recv {
        session_id: Option<SessionId>,
        since: i64,
        resolve: QueryResolver,
    },

    /// Record activity on a session (fire-and-forget).
    Poke { session_id: SessionId },

    /// List the nicks of live sessions.
    Who {
        respond_to: oneshot::Sender<Vec<String>>,
    },

    /// Look up a live session.
    GetSession {
        session_id: SessionId,
        respond_to: oneshot::Sender<Option<Session>>,
    },

    /// Register a push subscriber on a channel.
    Subscribe {
        channel: ChannelId,
        sink: SubscriberSink,
        respond_to: oneshot::Sender<SubscriberId>,
    },

    /// Forget a push subscriber (fire-and-forget, sent on transport close).
    Unsubscribe {
        channel: ChannelId,
        subscriber_id: SubscriberId,
    },

    /// Drop every push subscriber so their streams end (used on shutdown).
    CloseSubscribers {
        respond_to: oneshot::Sender<usize>,
    },

    /// Counts for a channel, if it exists.
    ChannelStats {
        channel: ChannelId,
        respond_to: oneshot::Sender<Option<ChannelStats>>,
    },

    /// Remove a channel and cancel its periodic tasks.
    DeleteChannel {
        channel: ChannelId,
        respond_to: oneshot::Sender<Option<ChannelStats>>,
    },

    /// Run every periodic task that is due.
    ///
    /// The background ticker sends this without a reply channel.
    Tick {
        respond_to: Option<oneshot::Sender<TickReport>>,
    },
}

// ============================================================================
// Relay Errors
// ============================================================================

/// Errors that can occur talking to the relay actor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// The request was rejected by the domain rules.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The actor shut down before replying.
    #[error("relay channel closed")]
    ChannelClosed,
}
