//! Core shared types for the LZ Cybernetics tool-call governor.

#![warn(missing_docs, clippy::pedantic)]

mod call;
mod error;
mod ids;

/// Tool invocation descriptor.
pub use call::ToolCall;
/// Error type and result alias shared across the governor.
pub use error::{Error, Result};
/// Sanitized session identifier used as the history key.
pub use ids::SessionId;
