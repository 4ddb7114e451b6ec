//! Periodic task table.
//!
//! The scheduler does not own a timer. Whoever drives it calls
//! [`Scheduler::due`] with the current time and runs what comes back, so
//! the same table works under a tokio interval in the daemon and under a
//! manual clock in tests.

use std::time::Duration;

use chrono::{DateTime, Utc};

use mum_core::ChannelId;

/// A recurring job the relay runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Append the keep-alive message to a channel
    Heartbeat(ChannelId),
    /// Flush a channel's stale pull-queries
    ReapPending(ChannelId),
    /// Evict sessions idle past the timeout
    ReapSessions,
}

impl Task {
    /// The channel this task belongs to, if any.
    pub fn channel(&self) -> Option<ChannelId> {
        match self {
            Self::Heartbeat(id) | Self::ReapPending(id) => Some(*id),
            Self::ReapSessions => None,
        }
    }
}

#[derive(Debug)]
struct Entry {
    task: Task,
    period_ms: i64,
    next_due_ms: i64,
}

/// Periodic tasks with their next deadlines, in registration order.
#[derive(Debug, Default)]
pub struct Scheduler {
    entries: Vec<Entry>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `task` to run every `period`, first at `now + period`.
    ///
    /// Re-registering a task replaces its period and deadline.
    pub fn schedule(&mut self, task: Task, period: Duration, now: DateTime<Utc>) {
        let period_ms = i64::try_from(period.as_millis()).unwrap_or(i64::MAX).max(1);
        let next_due_ms = now.timestamp_millis().saturating_add(period_ms);

        match self.entries.iter_mut().find(|e| e.task == task) {
            Some(entry) => {
                entry.period_ms = period_ms;
                entry.next_due_ms = next_due_ms;
            }
            None => self.entries.push(Entry {
                task,
                period_ms,
                next_due_ms,
            }),
        }
    }

    /// Removes a task. Returns `false` if it was not scheduled.
    pub fn cancel(&mut self, task: Task) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.task != task);
        self.entries.len() != before
    }

    /// Removes every task bound to `channel`. Returns how many were removed.
    pub fn cancel_channel(&mut self, channel: ChannelId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.task.channel() != Some(channel));
        before - self.entries.len()
    }

    /// Tasks whose deadline is at or before `now`, advancing each deadline.
    ///
    /// A task that missed several periods (a stalled tick source) runs once
    /// and its next deadline is re-based on `now`.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<Task> {
        let now_ms = now.timestamp_millis();
        let mut due = Vec::new();

        for entry in &mut self.entries {
            if entry.next_due_ms > now_ms {
                continue;
            }
            due.push(entry.task);

            entry.next_due_ms = entry.next_due_ms.saturating_add(entry.period_ms);
            if entry.next_due_ms <= now_ms {
                entry.next_due_ms = now_ms.saturating_add(entry.period_ms);
            }
        }

        due
    }

    pub fn is_scheduled(&self, task: Task) -> bool {
        self.entries.iter().any(|e| e.task == task)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
