//! Channels keyed by id, created on first access.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::info;

use mum_core::ChannelId;

use super::channel::Channel;

/// Lazily populated map of channels.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: HashMap<ChannelId, Channel>,
    backlog_limit: Option<usize>,
}

impl ChannelRegistry {
    /// New channels are created with `backlog_limit` (unbounded if `None`).
    pub fn new(backlog_limit: Option<usize>) -> Self {
        Self {
            channels: HashMap::new(),
            backlog_limit,
        }
    }

    /// Returns the channel for `id`, creating it if needed.
    ///
    /// The flag is `true` when the channel was created by this call, so the
    /// caller can start its periodic tasks.
    pub fn get_or_create(&mut self, id: ChannelId) -> (&mut Channel, bool) {
        match self.channels.entry(id) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => {
                info!(channel = %id, "Channel created");
                (entry.insert(Channel::new(id, self.backlog_limit)), true)
            }
        }
    }

    pub fn get(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(&id)
    }

    pub fn get_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.get_mut(&id)
    }

    /// Removes and returns the channel for `id`.
    pub fn delete(&mut self, id: ChannelId) -> Option<Channel> {
        let channel = self.channels.remove(&id)?;
        info!(channel = %id, "Channel deleted");
        Some(channel)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.channels.values_mut()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
