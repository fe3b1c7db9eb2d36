//! Errors raised inside the hook pipelines.
//!
//! None of these escape a hook: the fail-open boundary in [`crate::Governor`]
//! turns them into a permissive response.

use std::time::Duration;

use governor_memory::MemoryError;
use thiserror::Error;

/// Errors that can occur while handling a hook request.
#[derive(Debug, Error)]
pub enum HookError {
    /// The request body was not valid JSON.
    #[error("Failed to parse input JSON: {source}")]
    InvalidJson {
        /// Source [`serde_json::Error`].
        #[from]
        source: serde_json::Error,
    },
    /// The request was valid JSON but not a usable hook payload.
    #[error(transparent)]
    Payload(#[from] governor_primitives::Error),
    /// Session history could not be read or written.
    #[error("session store failure: {0}")]
    Store(#[from] MemoryError),
    /// The request could not be read from the input stream.
    #[error("failed to read hook input: {0}")]
    Input(#[from] std::io::Error),
    /// The request did not arrive in time.
    #[error("hook input not received within {0:?}")]
    InputTimeout(Duration),
}

/// Result alias for hook operations.
pub type HookResult<T> = Result<T, HookError>;
