//! M1SSION notifier — error types.

use m1ssion_core::error::DomainError;
use thiserror::Error;

/// Startup and runtime errors for the notifier binary.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required argument or environment variable is missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// The scenario file could not be read.
    #[error("cannot read scenario {path}: {source}")]
    Io {
        /// The file that failed.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The scenario file is not valid YAML for a scenario.
    #[error("invalid scenario: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A domain rule was violated (bad config value, bad step, stopped queue).
    #[error(transparent)]
    Domain(#[from] DomainError),
}
