//! Daemon configuration.
//!
//! Sources, lowest precedence first: built-in defaults, a TOML file, the
//! `MUM_LISTEN` environment variable, then command-line overrides applied
//! by the binary. [`RelayConfig::validate`] runs last.

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use mum_core::ChannelId;

/// Environment variable overriding the listen address.
pub const LISTEN_ENV: &str = "MUM_LISTEN";

/// Default HTTP listen address.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8001";

/// Tunables for the relay engine and HTTP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Address the HTTP server binds to
    pub listen: SocketAddr,

    /// Channel every join/part/send goes to
    pub default_channel: ChannelId,

    /// Idle time after which a session is evicted
    pub session_timeout_secs: u64,

    /// Age after which a parked `/recv` is answered with no messages
    pub pending_timeout_secs: u64,

    /// Period of the per-channel keep-alive message
    pub heartbeat_secs: u64,

    /// Period of the session and pending-query reapers
    pub reap_interval_secs: u64,

    /// How often the scheduler is driven
    pub tick_interval_ms: u64,

    /// Keep only this many most recent messages per channel (unbounded if unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backlog_limit: Option<usize>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8001)),
            default_channel: ChannelId::DEFAULT,
            session_timeout_secs: 60,
            pending_timeout_secs: 30,
            heartbeat_secs: 10,
            reap_interval_secs: 1,
            tick_interval_ms: 1000,
            backlog_limit: None,
        }
    }
}

impl RelayConfig {
    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// The per-user config file location (`<config dir>/mum/mumd.toml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mum").join("mumd.toml"))
    }

    /// Applies `MUM_LISTEN` if it is set.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = env::var(LISTEN_ENV) {
            self.listen = parse_listen(&value)?;
        }
        Ok(())
    }

    /// Rejects settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("session_timeout_secs", self.session_timeout_secs),
            ("pending_timeout_secs", self.pending_timeout_secs),
            ("heartbeat_secs", self.heartbeat_secs),
            ("reap_interval_secs", self.reap_interval_secs),
            ("tick_interval_ms", self.tick_interval_ms),
        ];
        for (field, value) in periods {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if self.backlog_limit == Some(0) {
            return Err(ConfigError::Invalid {
                field: "backlog_limit",
                reason: "must be greater than zero when set".to_string(),
            });
        }

        Ok(())
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn pending_timeout(&self) -> Duration {
        Duration::from_secs(self.pending_timeout_secs)
    }

    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn reap_period(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Parses a listen address such as `0.0.0.0:8001`.
pub fn parse_listen(value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidListen(value.to_string()))
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to render config: {0}")]
    Serialize(String),

    #[error("Invalid listen address: {0}")]
    InvalidListen(String),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
