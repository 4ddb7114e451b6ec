//! Table of live sessions.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use mum_core::{DomainError, DomainResult, Nick, Session, SessionId};

/// Live sessions keyed by id.
///
/// Nick uniqueness is enforced only among entries currently in the table;
/// a nick is free again as soon as its session is destroyed.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    timeout: Duration,
}

impl SessionRegistry {
    /// Creates an empty registry whose sessions expire after `timeout` idle.
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            timeout,
        }
    }

    /// Validates `raw_nick` and registers a new session for it.
    ///
    /// # Errors
    ///
    /// - `DomainError::InvalidNick` if the nick fails length/charset checks
    /// - `DomainError::NickInUse` if a live session already holds the nick
    pub fn create_session(
        &mut self,
        raw_nick: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Session> {
        let nick = Nick::parse(raw_nick)?;

        if self.sessions.values().any(|s| s.nick == nick) {
            debug!(nick = %nick, "Nick already held by a live session");
            return Err(DomainError::NickInUse(nick.into_string()));
        }

        let session = Session::new(nick, now);
        self.sessions.insert(session.id.clone(), session.clone());

        info!(
            session_id = %session.id.short(),
            nick = %session.nick,
            total_sessions = self.sessions.len(),
            "Session created"
        );
        Ok(session)
    }

    pub fn lookup(&self, session_id: &SessionId) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    /// Records activity on a session. Returns `false` if it is unknown.
    pub fn poke(&mut self, session_id: &SessionId, now: DateTime<Utc>) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(session) => {
                session.poke(now);
                true
            }
            None => false,
        }
    }

    /// Removes a session, returning it if it was live.
    pub fn destroy(&mut self, session_id: &SessionId) -> Option<Session> {
        let session = self.sessions.remove(session_id)?;
        info!(
            session_id = %session.id.short(),
            nick = %session.nick,
            remaining_sessions = self.sessions.len(),
            "Session destroyed"
        );
        Some(session)
    }

    /// Ids of sessions idle for longer than the timeout at `now`.
    pub fn expired(&self, now: DateTime<Utc>) -> Vec<SessionId> {
        self.sessions
            .values()
            .filter(|s| s.is_expired(now, self.timeout))
            .map(|s| s.id.clone())
            .collect()
    }

    /// Nicks of all live sessions, sorted.
    pub fn nicks(&self) -> Vec<String> {
        let mut nicks: Vec<String> = self
            .sessions
            .values()
            .map(|s| s.nick.as_str().to_string())
            .collect();
        nicks.sort();
        nicks
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
