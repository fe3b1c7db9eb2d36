//! History entry type and input summarisation.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Longest string (in characters) kept verbatim in a summarised input.
pub const MAX_SUMMARY_CHARS: usize = 200;

const TRUNCATION_SUFFIX: &str = "...[truncated]";

/// Returns the current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// One recorded tool call in a session history.
///
/// Entries are written by the pre-call hook before the outcome is known and
/// flipped to failed at most once by the post-call hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    tool: String,
    #[serde(default)]
    input: Value,
    timestamp: i64,
    #[serde(default)]
    failed: bool,
    #[serde(default)]
    failure_reason: Option<String>,
}

impl HistoryEntry {
    /// Records a call happening now, summarising its input.
    #[must_use]
    pub fn record(tool: impl Into<String>, input: &Value) -> Self {
        Self::at(tool, input, now_millis())
    }

    /// Records a call at an explicit timestamp (milliseconds since the epoch).
    #[must_use]
    pub fn at(tool: impl Into<String>, input: &Value, timestamp: i64) -> Self {
        Self {
            tool: tool.into(),
            input: summarize_input(input),
            timestamp,
            failed: false,
            failure_reason: None,
        }
    }

    /// Marks the entry as failed and returns it.
    #[must_use]
    pub fn with_failure(mut self, reason: Option<String>) -> Self {
        self.mark_failed(reason);
        self
    }

    /// Flags the entry as failed with an optional reason.
    pub fn mark_failed(&mut self, reason: Option<String>) {
        self.failed = true;
        self.failure_reason = reason;
    }

    /// Returns the tool name.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Returns the summarised input.
    #[must_use]
    pub fn input(&self) -> &Value {
        &self.input
    }

    /// Returns the timestamp in milliseconds since the epoch.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Returns true once the post-call hook detected a failure.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Returns the recorded failure reason.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }
}

/// Produces a bounded copy of a tool input for storage.
///
/// Top-level strings longer than [`MAX_SUMMARY_CHARS`] are truncated and
/// arrays are collapsed to an item-count marker. Non-object inputs are
/// returned unchanged.
#[must_use]
pub fn summarize_input(input: &Value) -> Value {
    let Some(fields) = input.as_object() else {
        return input.clone();
    };

    let summary: Map<String, Value> = fields
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(text) if text.chars().count() > MAX_SUMMARY_CHARS => {
                    let mut truncated: String = text.chars().take(MAX_SUMMARY_CHARS).collect();
                    truncated.push_str(TRUNCATION_SUFFIX);
                    Value::String(truncated)
                }
                Value::Array(items) => Value::String(format!("[Array: {} items]", items.len())),
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect();

    Value::Object(summary)
}
