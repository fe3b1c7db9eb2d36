//! Error types for the history store.

use std::time::Duration;

use serde_json::Error as SerdeError;
use thiserror::Error;

/// Errors emitted by history store components.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The provided configuration was invalid.
    #[error("invalid store configuration: {0}")]
    InvalidConfig(&'static str),
    /// Underlying I/O failure while reading or writing history files.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// Serialization or deserialization error.
    #[error("serialization error: {source}")]
    Serialization {
        /// Source [`serde_json::Error`].
        #[from]
        source: SerdeError,
    },
    /// A persistence operation did not finish within its time budget.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Operation that was abandoned.
        operation: &'static str,
        /// Budget that elapsed.
        after: Duration,
    },
}

/// Result type alias for history store operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
