//! Clock Module
//!
//! Time sources used for TTL arithmetic. All timestamps are milliseconds.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;

/// Milliseconds since the clock's origin.
pub type Timestamp = u64;

// == Clock Trait ==
/// Source of "now" for a cache store.
pub trait Clock: Debug + Send + Sync {
    /// Returns the current time in milliseconds.
    fn now(&self) -> Timestamp;
}

// == Monotonic Clock ==
/// Monotonic clock measured from its own creation.
///
/// Unaffected by wall-clock adjustments, so this is the default for stores.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        self.origin.elapsed().as_millis() as u64
    }
}

// == Wall Clock ==
/// Unix-epoch milliseconds from the system clock.
///
/// Can jump backwards when the system time is adjusted; entries then see a
/// zero elapsed time rather than a negative one.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl Clock for WallClock {
    fn now(&self) -> Timestamp {
        Utc::now().timestamp_millis().max(0) as u64
    }
}

// == Manual Clock ==
/// Clock that only moves when told to. Intended for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    /// Sets the clock to an absolute value, possibly backwards.
    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
