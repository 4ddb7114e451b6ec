//! Client interface for interacting with the RelayActor.
//!
//! The `RelayHandle` is a cheap-to-clone interface for sending commands to
//! the relay actor. HTTP handlers each hold a clone.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `RelayError::ChannelClosed`, or to an
//!   empty answer for read-only queries

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use mum_core::{ChannelId, Message, Session, SessionId};

use super::commands::{RelayCommand, RelayError};
use crate::engine::{ChannelStats, SubscriberId, TickReport};

/// Handle for interacting with the relay actor.
///
/// # Usage
///
/// ```ignore
/// let session = relay.join("alice").await?;
/// relay.send(session.id.clone(), "hello".into()).await?;
///
/// // Parks until something newer than `since` exists or the query goes stale
/// let messages = relay.recv(Some(session.id), since).await?;
/// ```
#[derive(Clone)]
pub struct RelayHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RelayCommand>,

    /// Channel that join/part/send/recv operate on
    default_channel: ChannelId,
}

impl RelayHandle {
    pub fn new(sender: mpsc::Sender<RelayCommand>, default_channel: ChannelId) -> Self {
        Self {
            sender,
            default_channel,
        }
    }

    pub fn default_channel(&self) -> ChannelId {
        self.default_channel
    }

    /// Returns `false` once the actor has stopped.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Create a session for `nick`.
    ///
    /// # Errors
    ///
    /// - `RelayError::Domain` if the nick is invalid or in use
    /// - `RelayError::ChannelClosed` if the actor has shut down
    pub async fn join(&self, nick: impl Into<String>) -> Result<Session, RelayError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RelayCommand::Join {
                nick: nick.into(),
                respond_to: tx,
            })
            .await
            .map_err(|_| RelayError::ChannelClosed)?;

        Ok(rx.await.map_err(|_| RelayError::ChannelClosed)??)
    }

    /// Destroy a session. Returns `None` if the id was not live.
    ///
    /// # Errors
    ///
    /// - `RelayError::ChannelClosed` if the actor has shut down
    pub async fn part(&self, session_id: SessionId) -> Result<Option<Session>, RelayError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RelayCommand::Part {
                session_id,
                respond_to: tx,
            })
            .await
            .map_err(|_| RelayError::ChannelClosed)?;

        rx.await.map_err(|_| RelayError::ChannelClosed)
    }

    /// Post a chat message as `session_id`.
    ///
    /// # Errors
    ///
    /// - `RelayError::Domain` if the text is empty or the session is unknown
    /// - `RelayError::ChannelClosed` if the actor has shut down
    pub async fn send(&self, session_id: SessionId, text: String) -> Result<Message, RelayError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RelayCommand::Send {
                session_id,
                text,
                respond_to: tx,
            })
            .await
            .map_err(|_| RelayError::ChannelClosed)?;

        Ok(rx.await.map_err(|_| RelayError::ChannelClosed)??)
    }

    /// Wait for messages newer than `since` on the default channel.
    ///
    /// Answers at once when something newer exists. Otherwise the query is
    /// parked until the pending-query reaper flushes it with an empty list.
    /// A known session is poked both when the query is issued and when it
    /// resolves.
    ///
    /// # Errors
    ///
    /// - `RelayError::ChannelClosed` if the actor shut down or the channel
    ///   was deleted while the query was parked
    pub async fn recv(
        &self,
        session_id: Option<SessionId>,
        since: i64,
    ) -> Result<Vec<Message>, RelayError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RelayCommand::Recv {
                session_id: session_id.clone(),
                since,
                resolve: tx,
            })
            .await
            .map_err(|_| RelayError::ChannelClosed)?;

        let messages = rx.await.map_err(|_| RelayError::ChannelClosed)?;

        if let Some(id) = session_id {
            self.poke(id).await;
        }

        Ok(messages)
    }

    /// Record activity on a session (fire-and-forget).
    pub async fn poke(&self, session_id: SessionId) {
        let _ = self.sender.send(RelayCommand::Poke { session_id }).await;
    }

    /// Nicks of live sessions, sorted.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn who(&self) -> Vec<String> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RelayCommand::Who { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Look up a live session.
    ///
    /// Returns `None` if the session doesn't exist or if communication
    /// with the actor fails.
    pub async fn session(&self, session_id: SessionId) -> Option<Session> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RelayCommand::GetSession {
                session_id,
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Register a push subscriber on `channel`.
    ///
    /// The receiver yields one NDJSON line per appended message. It ends
    /// when the subscriber is removed or the actor stops.
    ///
    /// # Errors
    ///
    /// - `RelayError::ChannelClosed` if the actor has shut down
    pub async fn subscribe(
        &self,
        channel: ChannelId,
    ) -> Result<(SubscriberId, mpsc::UnboundedReceiver<String>), RelayError> {
        let (sink, lines) = mpsc::unbounded_channel();
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RelayCommand::Subscribe {
                channel,
                sink,
                respond_to: tx,
            })
            .await
            .map_err(|_| RelayError::ChannelClosed)?;

        let subscriber_id = rx.await.map_err(|_| RelayError::ChannelClosed)?;
        Ok((subscriber_id, lines))
    }

    /// Remove a push subscriber.
    pub async fn unsubscribe(&self, channel: ChannelId, subscriber_id: SubscriberId) {
        let _ = self
            .sender
            .send(RelayCommand::Unsubscribe {
                channel,
                subscriber_id,
            })
            .await;
    }

    /// Remove a push subscriber without awaiting, for use from `Drop`.
    ///
    /// If the command buffer is full the send is finished on a spawned task
    /// when a runtime is available.
    pub fn unsubscribe_now(&self, channel: ChannelId, subscriber_id: SubscriberId) {
        let cmd = RelayCommand::Unsubscribe {
            channel,
            subscriber_id,
        };

        if let Err(TrySendError::Full(cmd)) = self.sender.try_send(cmd) {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                let sender = self.sender.clone();
                runtime.spawn(async move {
                    let _ = sender.send(cmd).await;
                });
            }
        }
    }

    /// Drop every push subscriber so their streams end.
    ///
    /// Returns how many were closed, or 0 if the actor is gone.
    pub async fn close_subscribers(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RelayCommand::CloseSubscribers { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or_default()
    }

    /// Message, parked-query and subscriber counts for a channel.
    pub async fn channel_stats(&self, channel: ChannelId) -> Option<ChannelStats> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RelayCommand::ChannelStats {
                channel,
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Delete a channel and cancel its heartbeat and reaper.
    ///
    /// Returns the channel's final counts, or `None` if it did not exist.
    pub async fn delete_channel(&self, channel: ChannelId) -> Option<ChannelStats> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RelayCommand::DeleteChannel {
                channel,
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Run every periodic task that is due now and report what happened.
    ///
    /// # Errors
    ///
    /// - `RelayError::ChannelClosed` if the actor has shut down
    pub async fn tick(&self) -> Result<TickReport, RelayError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RelayCommand::Tick {
                respond_to: Some(tx),
            })
            .await
            .map_err(|_| RelayError::ChannelClosed)?;

        rx.await.map_err(|_| RelayError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use mum_core::{DomainError, MessageKind, Nick};

    fn create_test_handle() -> (RelayHandle, mpsc::Receiver<RelayCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let handle = RelayHandle::new(cmd_tx, ChannelId::DEFAULT);
        (handle, cmd_rx)
    }

    fn create_test_session(nick: &str) -> Session {
        let now = DateTime::from_timestamp_millis(0).unwrap();
        Session::new(Nick::parse(nick).unwrap(), now)
    }

    #[tokio::test]
    async fn test_handle_is_clone() {
        let (handle, _rx) = create_test_handle();
        let cloned = handle.clone();
        assert_eq!(cloned.default_channel(), ChannelId::DEFAULT);
    }

    #[tokio::test]
    async fn test_join_sends_command() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(RelayCommand::Join { nick, respond_to }) = rx.recv().await {
                assert_eq!(nick, "alice");
                let _ = respond_to.send(Ok(create_test_session(&nick)));
                return true;
            }
            false
        });

        let session = handle.join("alice").await.unwrap();
        assert_eq!(session.nick.as_str(), "alice");
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_join_maps_domain_error() {
        let (handle, mut rx) = create_test_handle();

        tokio::spawn(async move {
            if let Some(RelayCommand::Join { nick, respond_to }) = rx.recv().await {
                let _ = respond_to.send(Err(DomainError::NickInUse(nick)));
            }
        });

        let result = handle.join("alice").await;
        assert!(matches!(
            result,
            Err(RelayError::Domain(DomainError::NickInUse(_)))
        ));
    }

    #[tokio::test]
    async fn test_join_channel_closed_error() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        let result = handle.join("alice").await;
        assert!(matches!(result, Err(RelayError::ChannelClosed)));
        assert!(!handle.is_connected());
    }

    #[tokio::test]
    async fn test_recv_pokes_after_resolve() {
        let (handle, mut rx) = create_test_handle();
        let id = SessionId::new("abc");

        let cmd_handler = tokio::spawn(async move {
            let Some(RelayCommand::Recv {
                session_id,
                since,
                resolve,
            }) = rx.recv().await
            else {
                return None;
            };
            assert_eq!(since, 7);
            let now = DateTime::from_timestamp_millis(8).unwrap();
            let msg = Message::new("bob", MessageKind::Msg, Some("x".into()), now);
            let _ = resolve.send(vec![msg]);

            match rx.recv().await {
                Some(RelayCommand::Poke { session_id: poked }) => Some((session_id, poked)),
                _ => None,
            }
        });

        let messages = handle.recv(Some(id.clone()), 7).await.unwrap();
        assert_eq!(messages.len(), 1);

        let (issued, poked) = cmd_handler.await.unwrap().unwrap();
        assert_eq!(issued, Some(id.clone()));
        assert_eq!(poked, id);
    }

    #[tokio::test]
    async fn test_recv_dropped_resolver_is_channel_closed() {
        let (handle, mut rx) = create_test_handle();

        tokio::spawn(async move {
            // Dropping the command drops the resolver unanswered.
            let _ = rx.recv().await;
        });

        let result = handle.recv(None, 0).await;
        assert!(matches!(result, Err(RelayError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_who_returns_empty_on_channel_close() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        assert!(handle.who().await.is_empty());
        assert!(handle.session(SessionId::new("abc")).await.is_none());
        assert_eq!(handle.close_subscribers().await, 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_now_does_not_block() {
        let (handle, mut rx) = create_test_handle();

        handle.unsubscribe_now(ChannelId::DEFAULT, 3);

        match rx.recv().await {
            Some(RelayCommand::Unsubscribe {
                channel,
                subscriber_id,
            }) => {
                assert_eq!(channel, ChannelId::DEFAULT);
                assert_eq!(subscriber_id, 3);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unsubscribe_now_after_close_is_silent() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        handle.unsubscribe_now(ChannelId::DEFAULT, 1);
    }
}
