//! Wall-clock sources for record timestamps.
//!
//! Counters, not timestamps, drive incremental sync. Timestamps only feed the
//! [`ConflictPolicy::TimestampWins`](crate::ConflictPolicy) comparison, so the
//! clock is injected into each node to keep that comparison testable.

use crate::Timestamp;
use chrono::{Duration, TimeZone, Utc};
use parking_lot::Mutex;
use std::fmt;

/// A source of "now" for a node.
pub trait WallClock: Send + Sync + fmt::Debug {
    /// The current time.
    fn now(&self) -> Timestamp;
}

/// The system UTC clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Shared between nodes (behind an `Arc`) it gives a single, deterministic
/// timeline for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<Timestamp>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Create a clock frozen at the given number of milliseconds since the epoch.
    pub fn at_millis(millis: i64) -> Self {
        let start = Utc
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or_default();
        Self::new(start)
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock();
        *current += by;
    }

    /// Jump the clock to an absolute time (may go backwards).
    pub fn set(&self, to: Timestamp) {
        *self.current.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at_millis(1_400_000_000_000)
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock()
    }
}
