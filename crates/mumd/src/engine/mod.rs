//! The relay engine: all chat state and the rules that mutate it.
//!
//! `RelayState` is plain synchronous state. Every operation takes the
//! current time as an argument, so the engine never reads a clock itself;
//! the actor in [`crate::relay`] supplies `now` from its [`mum_core::Clock`]
//! and serializes access.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        RelayState                         │
//! │                                                           │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌───────────┐  │
//! │  │ SessionRegistry │  │ ChannelRegistry │  │ Scheduler │  │
//! │  │  id → Session   │  │  id → Channel   │  │  periodic │  │
//! │  └─────────────────┘  └────────┬────────┘  │   tasks   │  │
//! │                                │           └───────────┘  │
//! │                                ▼                          │
//! │                 messages / pending / subscribers          │
//! └───────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use mum_core::{
    ChannelId, DomainError, DomainResult, Message, MessageKind, Session, SessionId, SERVER_NICK,
};

use crate::config::RelayConfig;

mod channel;
mod channels;
mod scheduler;
mod sessions;

pub use channel::{
    Channel, ChannelStats, PendingQuery, QueryOutcome, QueryResolver, SubscriberId, SubscriberSink,
};
pub use channels::ChannelRegistry;
pub use scheduler::{Scheduler, Task};
pub use sessions::SessionRegistry;

/// Text of the periodic keep-alive message.
pub const HEARTBEAT_TEXT: &str = "<3";

/// Why a session left the default channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartReason {
    /// Client called `/part`.
    Explicit,
    /// No activity within the session timeout.
    Expired,
}

impl std::fmt::Display for PartReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Explicit => write!(f, "parted"),
            Self::Expired => write!(f, "timed out"),
        }
    }
}

/// What one scheduler tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Heartbeat messages appended
    pub heartbeats: usize,
    /// Parked queries flushed empty
    pub flushed_queries: usize,
    /// Nicks of sessions evicted for inactivity
    pub expired: Vec<String>,
}

/// All relay state: sessions, channels and the periodic task table.
#[derive(Debug)]
pub struct RelayState {
    default_channel: ChannelId,
    pending_timeout: Duration,
    heartbeat_period: Duration,
    reap_period: Duration,
    sessions: SessionRegistry,
    channels: ChannelRegistry,
    scheduler: Scheduler,
}

impl RelayState {
    /// Creates empty state and schedules the global session reaper.
    pub fn new(config: &RelayConfig, now: DateTime<Utc>) -> Self {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Task::ReapSessions, config.reap_period(), now);

        Self {
            default_channel: config.default_channel,
            pending_timeout: config.pending_timeout(),
            heartbeat_period: config.heartbeat_period(),
            reap_period: config.reap_period(),
            sessions: SessionRegistry::new(config.session_timeout()),
            channels: ChannelRegistry::new(config.backlog_limit),
            scheduler,
        }
    }

    pub fn default_channel(&self) -> ChannelId {
        self.default_channel
    }

    // ========================================================================
    // Channels
    // ========================================================================

    /// Returns the channel for `id`, creating it and starting its heartbeat
    /// and pending-query reaper on first access.
    pub fn channel(&mut self, id: ChannelId, now: DateTime<Utc>) -> &mut Channel {
        let (channel, created) = self.channels.get_or_create(id);
        if created {
            self.scheduler
                .schedule(Task::Heartbeat(id), self.heartbeat_period, now);
            self.scheduler
                .schedule(Task::ReapPending(id), self.reap_period, now);
        }
        channel
    }

    /// Removes a channel and cancels its periodic tasks.
    ///
    /// Parked queries on the channel are dropped unresolved; their waiters
    /// observe a closed channel.
    pub fn delete_channel(&mut self, id: ChannelId) -> Option<Channel> {
        let channel = self.channels.delete(id)?;
        let cancelled = self.scheduler.cancel_channel(id);
        debug!(channel = %id, cancelled_tasks = cancelled, "Channel tasks cancelled");
        Some(channel)
    }

    pub fn channel_stats(&self, id: ChannelId) -> Option<ChannelStats> {
        self.channels.get(id).map(Channel::stats)
    }

    /// Appends a message to a channel and fans it out to its subscribers.
    pub fn append_message(
        &mut self,
        channel: ChannelId,
        nick: &str,
        kind: MessageKind,
        text: Option<String>,
        now: DateTime<Utc>,
    ) -> Message {
        self.channel(channel, now).append_message(nick, kind, text, now)
    }

    pub fn subscribe(
        &mut self,
        channel: ChannelId,
        sink: SubscriberSink,
        now: DateTime<Utc>,
    ) -> SubscriberId {
        self.channel(channel, now).add_subscriber(sink)
    }

    pub fn unsubscribe(&mut self, channel: ChannelId, subscriber_id: SubscriberId) -> bool {
        self.channels
            .get_mut(channel)
            .is_some_and(|c| c.remove_subscriber(subscriber_id))
    }

    /// Drops every push subscriber on every channel. Returns how many.
    pub fn close_subscribers(&mut self) -> usize {
        self.channels.iter_mut().map(Channel::clear_subscribers).sum()
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Creates a session and announces it on the default channel.
    ///
    /// # Errors
    ///
    /// - `DomainError::InvalidNick` if the nick fails validation
    /// - `DomainError::NickInUse` if a live session holds the nick
    pub fn join(&mut self, nick: &str, now: DateTime<Utc>) -> DomainResult<Session> {
        let session = self.sessions.create_session(nick, now)?;
        let channel = self.default_channel;
        self.append_message(channel, session.nick.as_str(), MessageKind::Join, None, now);
        Ok(session)
    }

    /// Destroys a session and announces its departure.
    ///
    /// Unknown ids are a no-op and return `None`, so a repeated part does
    /// not produce a second announcement.
    pub fn part(&mut self, session_id: &SessionId, now: DateTime<Utc>) -> Option<Session> {
        self.destroy_session(session_id, PartReason::Explicit, now)
    }

    fn destroy_session(
        &mut self,
        session_id: &SessionId,
        reason: PartReason,
        now: DateTime<Utc>,
    ) -> Option<Session> {
        let session = self.sessions.destroy(session_id)?;
        info!(nick = %session.nick, reason = %reason, "Session left");

        let channel = self.default_channel;
        self.append_message(channel, session.nick.as_str(), MessageKind::Part, None, now);
        Some(session)
    }

    /// Posts `text` on behalf of a session.
    ///
    /// # Errors
    ///
    /// - `DomainError::EmptyText` if `text` is empty
    /// - `DomainError::SessionNotFound` if the session is not live
    pub fn send(
        &mut self,
        session_id: &SessionId,
        text: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Message> {
        if text.is_empty() {
            return Err(DomainError::EmptyText);
        }

        let nick = match self.sessions.lookup(session_id) {
            Some(session) => session.nick.as_str().to_string(),
            None => {
                return Err(DomainError::SessionNotFound {
                    session_id: session_id.clone(),
                })
            }
        };
        self.sessions.poke(session_id, now);

        let channel = self.default_channel;
        Ok(self.append_message(channel, &nick, MessageKind::Msg, Some(text.to_string()), now))
    }

    /// Queries the default channel for messages newer than `since`.
    ///
    /// A known `session_id` is poked first; unknown or absent ids still get
    /// an answer.
    pub fn recv(
        &mut self,
        session_id: Option<&SessionId>,
        since: i64,
        now: DateTime<Utc>,
        resolve: QueryResolver,
    ) -> QueryOutcome {
        if let Some(id) = session_id {
            self.sessions.poke(id, now);
        }
        let channel = self.default_channel;
        self.channel(channel, now).query(since, now, resolve)
    }

    /// Records activity on a session. Returns `false` if it is unknown.
    pub fn poke(&mut self, session_id: &SessionId, now: DateTime<Utc>) -> bool {
        self.sessions.poke(session_id, now)
    }

    pub fn session(&self, session_id: &SessionId) -> Option<&Session> {
        self.sessions.lookup(session_id)
    }

    /// Nicks of all live sessions.
    pub fn who(&self) -> Vec<String> {
        self.sessions.nicks()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    // ========================================================================
    // Periodic tasks
    // ========================================================================

    /// Runs every task whose deadline has passed at `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        for task in self.scheduler.due(now) {
            match task {
                Task::Heartbeat(id) => {
                    if let Some(channel) = self.channels.get_mut(id) {
                        channel.append_message(
                            SERVER_NICK,
                            MessageKind::Msg,
                            Some(HEARTBEAT_TEXT.to_string()),
                            now,
                        );
                        report.heartbeats += 1;
                    }
                }
                Task::ReapPending(id) => {
                    if let Some(channel) = self.channels.get_mut(id) {
                        report.flushed_queries += channel.reap_pending(now, self.pending_timeout);
                    }
                }
                Task::ReapSessions => {
                    for session_id in self.sessions.expired(now) {
                        if let Some(session) =
                            self.destroy_session(&session_id, PartReason::Expired, now)
                        {
                            report.expired.push(session.nick.into_string());
                        }
                    }
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::{mpsc, oneshot};

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    fn state() -> RelayState {
        RelayState::new(&RelayConfig::default(), at(0))
    }

    fn backlog(state: &mut RelayState, since: i64, now: DateTime<Utc>) -> Vec<Message> {
        let (tx, mut rx) = oneshot::channel();
        state.recv(None, since, now, tx);
        rx.try_recv().unwrap_or_default()
    }

    #[test]
    fn test_join_announces_on_default_channel() {
        let mut state = state();
        let session = state.join("alice", at(100)).unwrap();

        assert_eq!(session.nick.as_str(), "alice");
        let messages = backlog(&mut state, 0, at(101));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind, MessageKind::Join);
        assert_eq!(messages[0].nick, "alice");
        assert_eq!(messages[0].text, None);
    }

    #[test]
    fn test_failed_join_changes_nothing() {
        let mut state = state();
        state.join("alice", at(1)).unwrap();

        assert!(state.join("alice", at(2)).is_err());
        assert!(state.join("bad nick", at(3)).is_err());

        assert_eq!(state.session_count(), 1);
        assert_eq!(backlog(&mut state, 0, at(4)).len(), 1);
    }

    #[test]
    fn test_send_requires_live_session_and_text() {
        let mut state = state();
        let session = state.join("alice", at(1)).unwrap();

        assert_eq!(
            state.send(&session.id, "", at(2)),
            Err(DomainError::EmptyText)
        );
        assert!(matches!(
            state.send(&SessionId::new("ghost"), "boo", at(2)),
            Err(DomainError::SessionNotFound { .. })
        ));

        let msg = state.send(&session.id, "hi", at(3)).unwrap();
        assert_eq!(msg.nick, "alice");
        assert_eq!(msg.text.as_deref(), Some("hi"));
        assert_eq!(state.session(&session.id).unwrap().last_active, at(3));
    }

    #[test]
    fn test_part_twice_announces_once() {
        let mut state = state();
        let session = state.join("alice", at(1)).unwrap();

        assert!(state.part(&session.id, at(2)).is_some());
        assert!(state.part(&session.id, at(3)).is_none());

        let parts = backlog(&mut state, 0, at(4))
            .into_iter()
            .filter(|m| m.kind == MessageKind::Part)
            .count();
        assert_eq!(parts, 1);
        assert!(state.who().is_empty());
    }

    #[test]
    fn test_recv_pokes_known_session() {
        let mut state = state();
        let session = state.join("alice", at(0)).unwrap();

        let (tx, _rx) = oneshot::channel();
        state.recv(Some(&session.id), 0, at(45_000), tx);
        assert_eq!(state.session(&session.id).unwrap().last_active, at(45_000));
    }

    #[test]
    fn test_parked_query_flushed_after_pending_timeout() {
        let mut state = state();
        let (tx, mut rx) = oneshot::channel();
        assert_eq!(state.recv(None, 0, at(0), tx), QueryOutcome::Parked);

        // Heartbeats land in the log but the parked query stays parked.
        for second in 1..=30 {
            state.tick(at(second * 1_000));
        }
        assert!(rx.try_recv().is_err());

        let report = state.tick(at(31_000));
        assert_eq!(report.flushed_queries, 1);
        assert!(rx.try_recv().unwrap().is_empty());
    }

    #[test]
    fn test_heartbeat_every_ten_seconds() {
        let mut state = state();
        let (tx, mut sub) = mpsc::unbounded_channel();
        state.subscribe(state.default_channel(), tx, at(0));

        let mut beats = 0;
        for second in 1..=25 {
            beats += state.tick(at(second * 1_000)).heartbeats;
        }
        assert_eq!(beats, 2);

        let line = sub.try_recv().unwrap();
        let msg: Message = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(msg.nick, SERVER_NICK);
        assert_eq!(msg.text.as_deref(), Some(HEARTBEAT_TEXT));
    }

    #[test]
    fn test_idle_session_expires_with_part() {
        let mut state = state();
        let idle = state.join("idle", at(0)).unwrap();
        let busy = state.join("busy", at(0)).unwrap();

        state.poke(&busy.id, at(50_000));
        let report = state.tick(at(61_000));

        assert_eq!(report.expired, vec!["idle".to_string()]);
        assert!(state.session(&idle.id).is_none());
        assert_eq!(state.who(), vec!["busy".to_string()]);

        let parts: Vec<_> = backlog(&mut state, 60_999, at(61_001))
            .into_iter()
            .filter(|m| m.kind == MessageKind::Part)
            .collect();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].nick, "idle");
    }

    #[test]
    fn test_delete_channel_cancels_its_tasks() {
        let mut state = state();
        let side = ChannelId::new(9);
        state.append_message(side, "alice", MessageKind::Msg, Some("x".into()), at(0));

        let deleted = state.delete_channel(side).unwrap();
        assert_eq!(deleted.stats().messages, 1);
        assert!(state.channel_stats(side).is_none());

        // Ticking past a heartbeat period must not resurrect the channel.
        state.tick(at(20_000));
        assert!(state.channel_stats(side).is_none());
    }

    #[test]
    fn test_unsubscribe_unknown_channel() {
        let mut state = state();
        assert!(!state.unsubscribe(ChannelId::new(42), 0));
    }

    #[test]
    fn test_close_subscribers_ends_streams() {
        let mut state = state();
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.subscribe(state.default_channel(), tx, at(0));

        assert_eq!(state.close_subscribers(), 1);
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
