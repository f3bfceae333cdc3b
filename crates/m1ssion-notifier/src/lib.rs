//! M1SSION notifier — plays scripted game occurrences through the
//! notification queue and reports what would be on screen.

pub mod error;
pub mod scenario;
pub mod subscriber;
