//! Wall-clock source for event timestamps and timer deadlines.

use chrono::{DateTime, Utc};

/// Abstraction over system time so event timestamps and timer deadlines can
/// be simulated in tests.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Whole milliseconds from `earlier` to now. Negative if `earlier` lies
    /// in the future.
    fn elapsed_ms_since(&self, earlier: DateTime<Utc>) -> i64 {
        (self.now() - earlier).num_milliseconds()
    }
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
