//! Shared error definitions for governor primitives.

use thiserror::Error;

/// Result alias used throughout the governor.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while manipulating governor primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided session identifier could not be used.
    #[error("invalid session id `{raw}`: {reason}")]
    InvalidSessionId {
        /// The offending raw identifier.
        raw: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// A hook payload did not have the expected shape.
    #[error("malformed hook payload: {reason}")]
    MalformedPayload {
        /// Human-readable reason for rejection.
        reason: String,
    },
}

impl Error {
    /// Helper to construct payload errors from string-like values.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }
}
