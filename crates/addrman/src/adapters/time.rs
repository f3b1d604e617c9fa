//! Time source adapters.

use crate::ports::TimeSource;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Production time source backed by the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// Controllable time source for deterministic tests.
///
/// Share it behind an `Arc`: one handle goes to the manager, the test
/// keeps the other and advances the clock between assertions.
#[derive(Debug)]
pub struct FixedTimeSource {
    secs: AtomicI64,
}

impl FixedTimeSource {
    /// Create a frozen clock at the given instant.
    pub fn new(secs: i64) -> Self {
        Self {
            secs: AtomicI64::new(secs),
        }
    }

    /// Jump the clock to an absolute instant.
    pub fn set(&self, secs: i64) {
        self.secs.store(secs, Ordering::Relaxed);
    }

    /// Advance the clock by `delta` seconds.
    pub fn advance(&self, delta: i64) {
        self.secs.fetch_add(delta, Ordering::Relaxed);
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> i64 {
        self.secs.load(Ordering::Relaxed)
    }
}
