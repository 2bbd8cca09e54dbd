//! Clock abstraction
//!
//! Every engine operation takes `now` explicitly. [`Clock`] is the seam callers
//! use to obtain that instant, so tests and replays can pin time.

use chrono::{DateTime, Duration, Utc};
use std::cell::Cell;

/// Source of the current instant.
pub trait Clock {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by [`Utc::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and for replaying stored timestamps.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Cell<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    /// Jump to an absolute instant. Going backwards is allowed (simulates clock skew).
    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    /// Move the clock by `by` (may be negative).
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Move the clock forward by whole seconds.
    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
