//! Relay using the actor pattern.
//!
//! The relay owns every session and channel. HTTP handlers talk to it
//! through a [`RelayHandle`]; a background ticker drives the periodic
//! heartbeat and reapers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  HTTP handlers  │────▶│   RelayActor    │────▶│ /update streams │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//!         │                       ▲    │                   ▲
//!         │   RelayCommand        │    │  NDJSON lines     │
//!         │   (mpsc channel)      │    └───────────────────┘
//!         ▼                       │       (unbounded mpsc)
//!    join/part/send/recv    ┌─────┴─────┐
//!                           │  ticker   │  Tick every tick_interval
//!                           └───────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::debug;

use mum_core::{Clock, SystemClock};

use crate::config::RelayConfig;

mod actor;
mod commands;
mod handle;

pub use actor::RelayActor;
pub use commands::{RelayCommand, RelayError};
pub use handle::RelayHandle;

/// Command channel buffer size
const COMMAND_BUFFER: usize = 256;

/// Spawn the relay actor on the system clock and return a handle.
///
/// # Example
///
/// ```no_run
/// use mumd::config::RelayConfig;
/// use mumd::relay::spawn_relay;
///
/// #[tokio::main]
/// async fn main() {
///     let relay = spawn_relay(&RelayConfig::default());
///     let nicks = relay.who().await;
/// }
/// ```
pub fn spawn_relay(config: &RelayConfig) -> RelayHandle {
    spawn_relay_with_clock(config, Arc::new(SystemClock))
}

/// Spawn the relay actor reading time from `clock`.
///
/// This function:
/// 1. Creates the command channel
/// 2. Spawns the RelayActor on a tokio task
/// 3. Spawns the background ticker
/// 4. Returns a RelayHandle for client use
///
/// The actor stops once every handle is dropped; the ticker holds only a
/// weak sender and stops with it.
pub fn spawn_relay_with_clock(config: &RelayConfig, clock: Arc<dyn Clock>) -> RelayHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RelayActor::new(cmd_rx, config, clock);
    tokio::spawn(actor.run());

    spawn_tick_task(cmd_tx.downgrade(), config.tick_interval());

    RelayHandle::new(cmd_tx, config.default_channel)
}

/// Spawn a background task that drives the relay's periodic tasks.
fn spawn_tick_task(sender: mpsc::WeakSender<RelayCommand>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(sender) = sender.upgrade() else {
                debug!("Tick task stopping: all relay handles dropped");
                break;
            };

            // Fire-and-forget; the actor reports what it did at debug level
            if sender
                .send(RelayCommand::Tick { respond_to: None })
                .await
                .is_err()
            {
                debug!("Tick task stopping: relay channel closed");
                break;
            }
        }
    });
}
