//! mum Core - Shared domain types for the message relay
//!
//! This crate provides the domain types shared between the daemon (mumd)
//! and the HTTP wire protocol (mum-protocol): messages, nicknames,
//! sessions, channel ids, and the clock the relay reads time from.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod channel;
pub mod clock;
pub mod error;
pub mod message;
pub mod session;

// Re-exports for convenience
pub use channel::ChannelId;
pub use clock::{elapsed, Clock, ManualClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use message::{Message, MessageKind, SERVER_NICK};
pub use session::{Nick, Session, SessionId, MAX_NICK_LEN};
