//! Channel identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a channel (an independent message stream).
///
/// The HTTP surface only ever addresses [`ChannelId::DEFAULT`], but the
/// daemon keeps channels in a registry keyed by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(u64);

impl ChannelId {
    /// The channel every session joins and parts on.
    pub const DEFAULT: ChannelId = ChannelId(1);

    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChannelId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
