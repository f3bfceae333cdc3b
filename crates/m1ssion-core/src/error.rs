//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
///
/// Queue operations never fail; these errors only surface from configuration
/// loading, input parsing, and talking to a stopped runtime.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A configuration value is missing, unparseable or out of range.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Input handed to an outer surface is malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// The queue runtime has stopped and cannot answer.
    #[error("queue unavailable: {0}")]
    Unavailable(String),
}
