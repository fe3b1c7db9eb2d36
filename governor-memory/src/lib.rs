//! Per-session tool-call history for the governor.
//!
//! A session history is an ordered, size-capped list of [`HistoryEntry`]
//! values. The pre-call hook appends to it and the post-call hook flags the
//! newest matching entry as failed. Persistence goes through
//! [`SessionStateStore`], with a file-backed and an in-memory implementation.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod history;
mod record;
mod store;
mod volatile;

pub use error::{MemoryError, MemoryResult};
pub use history::{History, HistoryStats};
pub use record::{HistoryEntry, MAX_SUMMARY_CHARS, now_millis, summarize_input};
pub use store::{DEFAULT_MAX_ENTRIES, FileSessionStore, SessionStateStore};
pub use volatile::VolatileSessionStore;
