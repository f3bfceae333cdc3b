//! Application layer: the queue service, its observers, timers and the
//! async runtime that drives it.

pub mod dispatcher;
pub mod queue;
pub mod runtime;
pub mod timers;
