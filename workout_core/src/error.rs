//! Error types for the workout_core library.

use std::io;
use uuid::Uuid;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for workout_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Domain rule violated: illegal transition, empty identifier,
    /// out-of-range value or a missing child inside an aggregate.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A stored entity could not be found by id
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// True for domain-rule violations (as opposed to IO/storage failures)
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}
