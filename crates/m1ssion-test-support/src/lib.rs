//! Shared test clocks and utilities for the M1SSION notification queue.

mod clock;

pub use clock::{FixedClock, ManualClock, test_epoch};
