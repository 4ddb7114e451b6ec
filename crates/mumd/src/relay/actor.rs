//! Relay actor - owns the relay state and processes commands.
//!
//! The RelayActor is the single owner of sessions, channels and the task
//! table. It receives commands via an mpsc channel, stamps each one with the
//! time from its [`Clock`], and applies it to [`RelayState`].
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Reply send failures are ignored; the requester may have gone away

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use mum_core::Clock;

use super::commands::RelayCommand;
use crate::config::RelayConfig;
use crate::engine::{Channel, RelayState};

/// The relay actor - owns all chat state.
///
/// Commands are processed one at a time in a single task, so the state
/// needs no locking and every operation sees a consistent view.
pub struct RelayActor {
    /// Command receiver
    receiver: mpsc::Receiver<RelayCommand>,

    /// Sessions, channels and periodic tasks
    state: RelayState,

    /// Time source for every command
    clock: Arc<dyn Clock>,
}

impl RelayActor {
    /// Creates an actor with empty state, scheduled from `clock.now()`.
    pub fn new(
        receiver: mpsc::Receiver<RelayCommand>,
        config: &RelayConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = RelayState::new(config, clock.now());
        Self {
            receiver,
            state,
            clock,
        }
    }

    /// Runs the actor event loop until every sender is dropped.
    pub async fn run(mut self) {
        info!(channel = %self.state.default_channel(), "Relay actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            "Relay actor stopped (sessions: {})",
            self.state.session_count()
        );
    }

    fn handle_command(&mut self, cmd: RelayCommand) {
        let now = self.clock.now();

        match cmd {
            RelayCommand::Join { nick, respond_to } => {
                let result = self.state.join(&nick, now);
                if let Err(e) = &result {
                    debug!(nick = %nick, error = %e, "Join rejected");
                }
                let _ = respond_to.send(result);
            }
            RelayCommand::Part {
                session_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.state.part(&session_id, now));
            }
            RelayCommand::Send {
                session_id,
                text,
                respond_to,
            } => {
                let _ = respond_to.send(self.state.send(&session_id, &text, now));
            }
            RelayCommand::Recv {
                session_id,
                since,
                resolve,
            } => {
                self.state.recv(session_id.as_ref(), since, now, resolve);
            }
            RelayCommand::Poke { session_id } => {
                self.state.poke(&session_id, now);
            }
            RelayCommand::Who { respond_to } => {
                let _ = respond_to.send(self.state.who());
            }
            RelayCommand::GetSession {
                session_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.state.session(&session_id).cloned());
            }
            RelayCommand::Subscribe {
                channel,
                sink,
                respond_to,
            } => {
                let _ = respond_to.send(self.state.subscribe(channel, sink, now));
            }
            RelayCommand::Unsubscribe {
                channel,
                subscriber_id,
            } => {
                self.state.unsubscribe(channel, subscriber_id);
            }
            RelayCommand::CloseSubscribers { respond_to } => {
                let closed = self.state.close_subscribers();
                debug!(closed, "Subscribers closed");
                let _ = respond_to.send(closed);
            }
            RelayCommand::ChannelStats {
                channel,
                respond_to,
            } => {
                let _ = respond_to.send(self.state.channel_stats(channel));
            }
            RelayCommand::DeleteChannel {
                channel,
                respond_to,
            } => {
                let deleted = self.state.delete_channel(channel);
                let _ = respond_to.send(deleted.as_ref().map(Channel::stats));
            }
            RelayCommand::Tick { respond_to } => {
                let report = self.state.tick(now);
                if report.flushed_queries > 0 || !report.expired.is_empty() {
                    debug!(
                        heartbeats = report.heartbeats,
                        flushed = report.flushed_queries,
                        expired = report.expired.len(),
                        "Tick"
                    );
                }
                if let Some(tx) = respond_to {
                    let _ = tx.send(report);
                }
            }
        }
    }
}
