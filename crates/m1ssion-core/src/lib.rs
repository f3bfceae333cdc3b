//! M1SSION Core — shared abstractions.
//!
//! Time, command and error types that the notification queue and its
//! drivers depend on. Nothing in here touches a runtime or I/O.

pub mod clock;
pub mod command;
pub mod error;
