//! Ordered, size-capped session history.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::record::HistoryEntry;

/// Insertion-ordered list of the calls made in one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a history from already ordered entries (oldest first).
    #[must_use]
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        Self { entries }
    }

    /// Decodes persisted history, treating anything unusable as empty.
    ///
    /// Invalid JSON and non-array documents yield an empty history. Individual
    /// array elements that are not valid entries are skipped.
    #[must_use]
    pub fn decode_lenient(data: &[u8]) -> Self {
        let document: Value = match serde_json::from_slice(data) {
            Ok(document) => document,
            Err(err) => {
                warn!(error = %err, "history is not valid JSON, starting fresh");
                return Self::new();
            }
        };

        let Value::Array(items) = document else {
            warn!("history is not a JSON array, starting fresh");
            return Self::new();
        };

        let mut skipped = 0_usize;
        let entries = items
            .into_iter()
            .filter_map(|item| {
                serde_json::from_value::<HistoryEntry>(item)
                    .inspect_err(|_| skipped += 1)
                    .ok()
            })
            .collect();
        if skipped > 0 {
            warn!(skipped, "dropped malformed history entries");
        }

        Self { entries }
    }

    /// Returns the entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no calls have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends an entry at the newest end.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    /// Drops the oldest entries until at most `max` remain.
    pub fn trim_to(&mut self, max: usize) {
        if self.entries.len() > max {
            let excess = self.entries.len() - max;
            self.entries.drain(..excess);
        }
    }

    /// Flags the newest not-yet-failed entry for `tool` as failed.
    ///
    /// Returns false when no such entry exists.
    pub fn mark_last_failed(&mut self, tool: &str, reason: Option<String>) -> bool {
        match self
            .entries
            .iter_mut()
            .rev()
            .find(|entry| entry.tool() == tool && !entry.failed())
        {
            Some(entry) => {
                entry.mark_failed(reason);
                true
            }
            None => false,
        }
    }

    /// Returns the entries whose timestamp lies within `window_ms` of `now_ms`.
    #[must_use]
    pub fn recent(&self, window_ms: i64, now_ms: i64) -> Vec<&HistoryEntry> {
        let window_start = now_ms - window_ms;
        self.entries
            .iter()
            .filter(|entry| entry.timestamp() >= window_start)
            .collect()
    }

    /// Summarises call and failure counts inside the trailing window.
    #[must_use]
    pub fn stats(&self, window_ms: i64, now_ms: i64) -> HistoryStats {
        let recent = self.recent(window_ms, now_ms);
        let mut tool_counts = BTreeMap::new();
        let mut failure_counts = BTreeMap::new();

        for entry in &recent {
            *tool_counts.entry(entry.tool().to_owned()).or_insert(0) += 1;
            if entry.failed() {
                *failure_counts.entry(entry.tool().to_owned()).or_insert(0) += 1;
            }
        }

        HistoryStats {
            total_calls: self.entries.len(),
            recent_calls: recent.len(),
            tool_counts,
            failure_counts,
            window_ms,
        }
    }
}

impl IntoIterator for History {
    type Item = HistoryEntry;
    type IntoIter = std::vec::IntoIter<HistoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Snapshot of a session history relative to a trailing window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    /// Entries in the whole history, regardless of age.
    pub total_calls: usize,
    /// Entries inside the window.
    pub recent_calls: usize,
    /// Windowed calls per tool.
    pub tool_counts: BTreeMap<String, usize>,
    /// Windowed failed calls per tool; tools without failures are absent.
    pub failure_counts: BTreeMap<String, usize>,
    /// Window length in milliseconds.
    pub window_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WINDOW: i64 = 30_000;
    const NOW: i64 = 1_000_000;

    fn entry(tool: &str, age: i64, failed: bool) -> HistoryEntry {
        let entry = HistoryEntry::at(tool, &json!({}), NOW - age);
        if failed { entry.with_failure(None) } else { entry }
    }

    #[test]
    fn empty_history_stats() {
        let stats = History::new().stats(WINDOW, NOW);
        assert_eq!(stats.total_calls, 0);
        assert_eq!(stats.recent_calls, 0);
        assert!(stats.tool_counts.is_empty());
        assert!(stats.failure_counts.is_empty());
        assert_eq!(stats.window_ms, WINDOW);
    }

    #[test]
    fn stats_count_tools_and_failures() {
        let history = History::from_entries(vec![
            entry("Read", 1_000, false),
            entry("Write", 2_000, true),
            entry("Read", 3_000, true),
            entry("Bash", 4_000, false),
        ]);

        let stats = history.stats(WINDOW, NOW);
        assert_eq!(stats.total_calls, 4);
        assert_eq!(stats.recent_calls, 4);
        assert_eq!(stats.tool_counts["Read"], 2);
        assert_eq!(stats.tool_counts["Write"], 1);
        assert_eq!(stats.tool_counts["Bash"], 1);
        assert_eq!(stats.failure_counts["Read"], 1);
        assert_eq!(stats.failure_counts["Write"], 1);
        assert!(!stats.failure_counts.contains_key("Bash"));
    }

    #[test]
    fn stats_exclude_entries_outside_window() {
        let history = History::from_entries(vec![
            entry("Read", WINDOW + 10_000, true),
            entry("Read", 1_000, false),
        ]);

        let stats = history.stats(WINDOW, NOW);
        assert_eq!(stats.total_calls, 2, "total includes every entry");
        assert_eq!(stats.recent_calls, 1, "recent only counts the window");
        assert_eq!(stats.tool_counts["Read"], 1);
        assert!(!stats.failure_counts.contains_key("Read"));
    }

    #[test]
    fn mark_last_failed_targets_newest_unfailed_match() {
        let mut history = History::from_entries(vec![
            entry("Edit", 3_000, false),
            entry("Edit", 2_000, false),
            entry("Read", 1_000, false),
        ]);

        assert!(history.mark_last_failed("Edit", Some("first".into())));
        assert!(history.entries()[1].failed());
        assert!(!history.entries()[0].failed());

        assert!(history.mark_last_failed("Edit", Some("second".into())));
        assert_eq!(history.entries()[0].failure_reason(), Some("second"));

        assert!(!history.mark_last_failed("Edit", None));
        assert!(!history.mark_last_failed("Glob", None));
    }

    #[test]
    fn trim_drops_oldest_first() {
        let mut history = History::new();
        for age in (0..5).rev() {
            history.push(entry("Read", age, false));
        }
        history.trim_to(2);
        assert_eq!(history.len(), 2);
        assert_eq!(history.entries()[0].timestamp(), NOW - 1);
        assert_eq!(history.entries()[1].timestamp(), NOW);
    }

    #[test]
    fn lenient_decode_fails_open() {
        assert!(History::decode_lenient(b"not json").is_empty());
        assert!(History::decode_lenient(br#"{"tool":"Read"}"#).is_empty());

        let data = br#"[
            {"tool":"Read","input":{},"timestamp":5,"failed":false,"failureReason":null},
            {"nonsense":true},
            {"tool":"Bash","timestamp":6}
        ]"#;
        let history = History::decode_lenient(data);
        assert_eq!(history.len(), 2);
        assert_eq!(history.entries()[1].tool(), "Bash");
        assert!(!history.entries()[1].failed());
    }
}
