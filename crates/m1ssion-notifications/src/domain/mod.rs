//! Domain layer: event taxonomy, merge policy and queue commands.

pub mod commands;
pub mod events;
pub mod merge;
