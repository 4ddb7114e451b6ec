//! A single channel: message log, parked pull-queries and push subscribers.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use mum_core::{elapsed, ChannelId, Message, MessageKind};
use mum_protocol::update_line;

/// Identifies one push subscriber within a channel.
pub type SubscriberId = u64;

/// Where a push subscriber's encoded messages are written.
///
/// Unbounded so that a broadcast never waits on a slow reader.
pub type SubscriberSink = mpsc::UnboundedSender<String>;

/// Resolves a pull-query with the messages it asked for.
pub type QueryResolver = oneshot::Sender<Vec<Message>>;

/// A `/recv` that found nothing newer than its `since` and is waiting to be flushed.
#[derive(Debug)]
pub struct PendingQuery {
    issued_at: DateTime<Utc>,
    resolve: QueryResolver,
}

impl PendingQuery {
    pub fn new(issued_at: DateTime<Utc>, resolve: QueryResolver) -> Self {
        Self { issued_at, resolve }
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    fn resolve(self, messages: Vec<Message>) {
        // The requester may have gone away; nothing to do if so.
        let _ = self.resolve.send(messages);
    }
}

/// What a call to [`Channel::query`] did with its resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Resolved immediately with this many messages
    Answered(usize),
    /// Nothing matched; the query is parked until the reaper flushes it
    Parked,
}

/// Point-in-time counts for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelStats {
    pub messages: usize,
    pub pending: usize,
    pub subscribers: usize,
}

/// The state of one channel.
///
/// Parked queries are only ever resolved by [`Channel::reap_pending`], never by
/// a later append: a pull client re-polls after its query is flushed empty.
#[derive(Debug)]
pub struct Channel {
    id: ChannelId,
    messages: VecDeque<Message>,
    pending: VecDeque<PendingQuery>,
    subscribers: HashMap<SubscriberId, SubscriberSink>,
    next_subscriber: SubscriberId,
    backlog_limit: Option<usize>,
}

impl Channel {
    /// Creates an empty channel. With `backlog_limit` set, only that many
    /// most recent messages are retained.
    pub fn new(id: ChannelId, backlog_limit: Option<usize>) -> Self {
        Self {
            id,
            messages: VecDeque::new(),
            pending: VecDeque::new(),
            subscribers: HashMap::new(),
            next_subscriber: 0,
            backlog_limit,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Stores a message stamped `now` and pushes it to every subscriber.
    pub fn append_message(
        &mut self,
        nick: &str,
        kind: MessageKind,
        text: Option<String>,
        now: DateTime<Utc>,
    ) -> Message {
        let message = Message::new(nick, kind, text, now);
        info!(channel = %self.id, "{}", message.log_line());

        self.messages.push_back(message.clone());
        if let Some(limit) = self.backlog_limit {
            while self.messages.len() > limit {
                self.messages.pop_front();
            }
        }

        self.broadcast(&message);
        message
    }

    /// Sends the encoded message to every subscriber without waiting.
    ///
    /// A subscriber whose receiver is gone is left in place; the connection
    /// layer removes it when its transport closes.
    fn broadcast(&self, message: &Message) {
        if self.subscribers.is_empty() {
            return;
        }

        let line = match update_line(message) {
            Ok(line) => line,
            Err(e) => {
                debug!(channel = %self.id, error = %e, "Failed to encode message");
                return;
            }
        };

        for (subscriber_id, sink) in &self.subscribers {
            if sink.send(line.clone()).is_err() {
                debug!(
                    channel = %self.id,
                    subscriber_id = subscriber_id,
                    "Subscriber receiver closed, dropping message"
                );
            }
        }
    }

    /// Messages stamped strictly after `since` (epoch ms), oldest first.
    pub fn messages_since(&self, since: i64) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| m.is_newer_than(since))
            .cloned()
            .collect()
    }

    /// Answers a pull-query now if anything is newer than `since`,
    /// otherwise parks it.
    pub fn query(
        &mut self,
        since: i64,
        now: DateTime<Utc>,
        resolve: QueryResolver,
    ) -> QueryOutcome {
        let matching = self.messages_since(since);

        if matching.is_empty() {
            self.pending.push_back(PendingQuery::new(now, resolve));
            debug!(
                channel = %self.id,
                since = since,
                pending = self.pending.len(),
                "Query parked"
            );
            return QueryOutcome::Parked;
        }

        let count = matching.len();
        // The requester may have gone away; nothing to do if so.
        let _ = resolve.send(matching);
        QueryOutcome::Answered(count)
    }

    /// Flushes parked queries older than `max_age` with an empty result.
    ///
    /// Queries are parked in issue order, so scanning stops at the first
    /// one that is still fresh. Returns the number flushed.
    pub fn reap_pending(&mut self, now: DateTime<Utc>, max_age: Duration) -> usize {
        let mut flushed = 0;

        while let Some(oldest) = self.pending.front() {
            if elapsed(oldest.issued_at(), now) <= max_age {
                break;
            }
            if let Some(query) = self.pending.pop_front() {
                query.resolve(Vec::new());
                flushed += 1;
            }
        }

        if flushed > 0 {
            debug!(
                channel = %self.id,
                flushed = flushed,
                remaining = self.pending.len(),
                "Flushed stale queries"
            );
        }
        flushed
    }

    /// Registers a push subscriber for every future message.
    pub fn add_subscriber(&mut self, sink: SubscriberSink) -> SubscriberId {
        let subscriber_id = self.next_subscriber;
        self.next_subscriber = self.next_subscriber.wrapping_add(1);
        self.subscribers.insert(subscriber_id, sink);

        debug!(
            channel = %self.id,
            subscriber_id = subscriber_id,
            total = self.subscribers.len(),
            "Subscriber added"
        );
        subscriber_id
    }

    /// Forgets a subscriber. Returns `false` if it was not registered.
    pub fn remove_subscriber(&mut self, subscriber_id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&subscriber_id).is_some();
        if removed {
            debug!(
                channel = %self.id,
                subscriber_id = subscriber_id,
                remaining = self.subscribers.len(),
                "Subscriber removed"
            );
        }
        removed
    }

    /// Drops every subscriber sink, ending their streams.
    pub fn clear_subscribers(&mut self) -> usize {
        let count = self.subscribers.len();
        self.subscribers.clear();
        count
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            messages: self.messages.len(),
            pending: self.pending.len(),
            subscribers: self.subscribers.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mum_core::SERVER_NICK;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    fn channel() -> Channel {
        Channel::new(ChannelId::DEFAULT, None)
    }

    #[test]
    fn test_append_then_query_returns_message_once() {
        let mut ch = channel();
        ch.append_message("alice", MessageKind::Msg, Some("hi".into()), at(1_000));

        let (tx, mut rx) = oneshot::channel();
        let outcome = ch.query(999, at(1_001), tx);

        assert_eq!(outcome, QueryOutcome::Answered(1));
        let messages = rx.try_recv().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].nick, "alice");
        assert_eq!(messages[0].text.as_deref(), Some("hi"));
    }

    #[test]
    fn test_query_is_strictly_after_since_and_ordered() {
        let mut ch = channel();
        ch.append_message("a", MessageKind::Join, None, at(10));
        ch.append_message("a", MessageKind::Msg, Some("one".into()), at(20));
        ch.append_message("a", MessageKind::Msg, Some("two".into()), at(30));

        let newer = ch.messages_since(10);
        let texts: Vec<_> = newer.iter().map(|m| m.text.as_deref()).collect();
        assert_eq!(texts, vec![Some("one"), Some("two")]);
    }

    #[test]
    fn test_query_parks_when_nothing_newer() {
        let mut ch = channel();
        ch.append_message("a", MessageKind::Msg, Some("old".into()), at(100));

        let (tx, mut rx) = oneshot::channel();
        assert_eq!(ch.query(100, at(200), tx), QueryOutcome::Parked);
        assert_eq!(ch.stats().pending, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_append_does_not_wake_parked_query() {
        let mut ch = channel();
        let (tx, mut rx) = oneshot::channel();
        ch.query(0, at(0), tx);

        ch.append_message("alice", MessageKind::Msg, Some("late".into()), at(5_000));

        assert!(rx.try_recv().is_err());
        assert_eq!(ch.stats().pending, 1);
    }

    #[test]
    fn test_reap_pending_flushes_only_stale_queries() {
        let mut ch = channel();
        let max_age = Duration::from_secs(30);

        let (old_tx, mut old_rx) = oneshot::channel();
        ch.query(0, at(0), old_tx);
        let (young_tx, mut young_rx) = oneshot::channel();
        ch.query(0, at(20_000), young_tx);

        // exactly 30s old is not yet stale
        assert_eq!(ch.reap_pending(at(30_000), max_age), 0);

        assert_eq!(ch.reap_pending(at(30_001), max_age), 1);
        assert_eq!(old_rx.try_recv().unwrap(), Vec::<Message>::new());
        assert!(young_rx.try_recv().is_err());

        assert_eq!(ch.reap_pending(at(50_001), max_age), 1);
        assert!(young_rx.try_recv().unwrap().is_empty());
        assert_eq!(ch.stats().pending, 0);
    }

    #[test]
    fn test_reap_pending_tolerates_dropped_requester() {
        let mut ch = channel();
        let (tx, rx) = oneshot::channel();
        ch.query(0, at(0), tx);
        drop(rx);

        assert_eq!(ch.reap_pending(at(60_000), Duration::from_secs(30)), 1);
    }

    #[test]
    fn test_broadcast_reaches_every_subscriber() {
        let mut ch = channel();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        ch.add_subscriber(tx_a);
        ch.add_subscriber(tx_b);

        ch.append_message(SERVER_NICK, MessageKind::Msg, Some("<3".into()), at(42));

        for rx in [&mut rx_a, &mut rx_b] {
            let line = rx.try_recv().unwrap();
            let msg: Message = serde_json::from_str(line.trim_end()).unwrap();
            assert_eq!(msg.nick, SERVER_NICK);
            assert_eq!(msg.text.as_deref(), Some("<3"));
            assert_eq!(msg.timestamp_millis(), 42);
        }
    }

    #[test]
    fn test_removed_subscriber_gets_nothing() {
        let mut ch = channel();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = ch.add_subscriber(tx);

        assert!(ch.remove_subscriber(id));
        assert!(!ch.remove_subscriber(id));

        ch.append_message("alice", MessageKind::Msg, Some("hi".into()), at(1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dead_subscriber_does_not_block_others() {
        let mut ch = channel();
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        let (live_tx, mut live_rx) = mpsc::unbounded_channel();
        ch.add_subscriber(dead_tx);
        ch.add_subscriber(live_tx);
        drop(dead_rx);

        ch.append_message("alice", MessageKind::Msg, Some("still here".into()), at(1));

        assert!(live_rx.try_recv().is_ok());
        assert_eq!(ch.stats().subscribers, 2);
    }

    #[test]
    fn test_unbounded_backlog_by_default() {
        let mut ch = channel();
        for i in 0..500 {
            ch.append_message("a", MessageKind::Msg, Some(i.to_string()), at(i));
        }
        assert_eq!(ch.stats().messages, 500);
    }

    #[test]
    fn test_backlog_limit_keeps_most_recent() {
        let mut ch = Channel::new(ChannelId::DEFAULT, Some(3));
        for i in 1..=5 {
            ch.append_message("a", MessageKind::Msg, Some(i.to_string()), at(i));
        }

        let texts: Vec<_> = ch
            .messages_since(0)
            .into_iter()
            .filter_map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["3", "4", "5"]);
    }
}
