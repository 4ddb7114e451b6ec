//! Time sources for the relay.
//!
//! Every timestamp the relay stamps on a message, and every age it compares
//! against a timeout, comes from a [`Clock`]. Production uses
//! [`SystemClock`]; tests drive a [`ManualClock`] so that expiry and
//! heartbeat behaviour can be exercised without sleeping.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Time from `earlier` to `later`, or zero if `later` is not after `earlier`.
pub fn elapsed(earlier: DateTime<Utc>, later: DateTime<Utc>) -> Duration {
    later
        .signed_duration_since(earlier)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// A source of wall-clock time.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Cloning shares the underlying instant, so a test can keep one clone
/// and hand another to the daemon.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    /// Creates a clock frozen at the given epoch milliseconds.
    pub fn at_millis(millis: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(millis)),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let delta = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }

    /// Jumps the clock to an absolute instant.
    pub fn set(&self, to: DateTime<Utc>) {
        self.millis.store(to.timestamp_millis(), Ordering::SeqCst);
    }

    /// Current reading as epoch milliseconds.
    pub fn millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::at_millis(1_000);
        assert_eq!(clock.now().timestamp_millis(), 1_000);

        clock.advance(Duration::from_secs(30));
        assert_eq!(clock.now().timestamp_millis(), 31_000);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::at_millis(0);
        let shared = clock.clone();

        clock.advance(Duration::from_millis(250));
        assert_eq!(shared.millis(), 250);
    }

    #[test]
    fn test_elapsed_clamps_to_zero() {
        let early = ManualClock::at_millis(1_000).now();
        let late = ManualClock::at_millis(4_500).now();

        assert_eq!(elapsed(early, late), Duration::from_millis(3_500));
        assert_eq!(elapsed(late, early), Duration::ZERO);
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let a = SystemClock.now();
        let b = SystemClock.now();
        assert!(b >= a);
    }
}
