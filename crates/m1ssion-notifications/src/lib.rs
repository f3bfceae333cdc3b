//! M1SSION — Game event notification queue bounded context.
//!
//! Serializes gameplay notifications (rewards, level-ups, battle results)
//! into one displayed event at a time, folding additive rewards that arrive
//! close together and retiring minor events on a timer.

pub mod application;
pub mod config;
pub mod domain;
