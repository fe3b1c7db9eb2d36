//! Hallucination, malformed-input, loop and contradiction detectors.
//!
//! Every detector is a pure function over its inputs; the current time is
//! passed in explicitly so the windowed checks are deterministic under test.

use std::sync::LazyLock;

use governor_memory::{History, HistoryEntry, summarize_input};
use governor_primitives::ToolCall;
use regex::Regex;
use serde_json::{Number, Value};

use crate::contracts::LoopInfo;
use crate::invariants::{Limits, MCP_PREFIX, is_allowed};

/// Segments a well-formed MCP tool name has at minimum (`mcp__server__tool`).
const MCP_MIN_SEGMENTS: usize = 3;

/// Returns true when `tool` does not name a real tool.
///
/// Absent and empty names are hallucinated. MCP-style names need at least
/// three `__`-delimited segments; anything else must be on the allow-list.
#[must_use]
pub fn is_hallucinated(tool: Option<&str>) -> bool {
    let Some(tool) = tool.filter(|tool| !tool.is_empty()) else {
        return true;
    };
    if tool.starts_with(MCP_PREFIX) {
        return tool.split("__").count() < MCP_MIN_SEGMENTS;
    }
    !is_allowed(tool)
}

/// Describes why a raw tool input is not a JSON object.
///
/// An empty list means the input is well-formed.
#[must_use]
pub fn detect_malformed_input(input: &Value) -> Vec<String> {
    let issue = match input {
        Value::Object(_) => return Vec::new(),
        Value::Null => "Input is null or undefined".to_owned(),
        Value::Array(_) => "Input is an array, expected object".to_owned(),
        Value::String(_) => "Input is not an object (got string)".to_owned(),
        Value::Number(_) => "Input is not an object (got number)".to_owned(),
        Value::Bool(_) => "Input is not an object (got boolean)".to_owned(),
    };
    vec![issue]
}

/// Fields that identify "the same call" for known tools.
fn key_fields(tool: &str) -> Option<&'static [&'static str]> {
    match tool {
        "Read" | "Write" => Some(&["file_path"]),
        "Edit" => Some(&["file_path", "old_string"]),
        "Bash" => Some(&["command"]),
        "Glob" | "Grep" => Some(&["pattern", "path"]),
        _ => None,
    }
}

/// Reduces a call to `tool:value|value|...` over its identifying fields.
///
/// Unknown tools use the first three input keys in insertion order. Values
/// are loosely stringified: falsy values become empty, arrays are joined
/// with commas and objects collapse to a fixed marker.
#[must_use]
pub fn fingerprint(tool: &str, input: &Value) -> String {
    let values: Vec<String> = match key_fields(tool) {
        Some(fields) => fields
            .iter()
            .map(|field| loose_string(input.get(*field)))
            .collect(),
        None => input
            .as_object()
            .map(|fields| {
                fields
                    .values()
                    .take(3)
                    .map(|value| loose_string(Some(value)))
                    .collect()
            })
            .unwrap_or_default(),
    };
    format!("{tool}:{}", values.join("|"))
}

/// Formats integral floats without a fractional part, so `1.0` reads `1`.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn number_string(number: &Number) -> String {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    match number.as_f64() {
        Some(value) if number.is_f64() && value.trunc() == value && value.abs() < MAX_EXACT => {
            (value as i64).to_string()
        }
        _ => number.to_string(),
    }
}

fn loose_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null | Value::Bool(false)) => String::new(),
        Some(Value::Bool(true)) => "true".to_owned(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => {
            if number.as_f64() == Some(0.0) {
                String::new()
            } else {
                number_string(number)
            }
        }
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                Value::Bool(false) => "false".to_owned(),
                Value::Number(number) => number_string(number),
                other => loose_string(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_owned(),
    }
}

/// Detects repetition, oscillation and failure runs for the current call.
///
/// Only entries within `limits.oscillation_window_ms` of `now_ms` are
/// considered. Checks run in a fixed order (oscillation, repetition,
/// consecutive failures) and a later trigger overwrites the pattern of an
/// earlier one.
#[must_use]
pub fn detect_loop(history: &History, call: &ToolCall, limits: &Limits, now_ms: i64) -> LoopInfo {
    let mut info = LoopInfo::default();
    if history.is_empty() {
        return info;
    }

    let recent = history.recent(limits.oscillation_window_ms, now_ms);
    let tool = call.tool();

    info.consecutive_failures = recent
        .iter()
        .rev()
        .take_while(|entry| entry.tool() == tool && entry.failed())
        .count();

    // History stores summarised inputs, so compare against the same form.
    let current = fingerprint(tool, &summarize_input(call.input()));
    info.similar_calls_count = recent
        .iter()
        .filter(|entry| entry_fingerprint(entry) == current)
        .count();

    if let [a, b, c, d] = &recent[recent.len().saturating_sub(4)..]
        && a.tool() == c.tool()
        && b.tool() == d.tool()
        && a.tool() != b.tool()
    {
        info.loop_detected = true;
        info.pattern = Some(format!("Oscillation: {} <-> {}", a.tool(), b.tool()));
        info.pattern_tools = vec![a.tool().to_owned(), b.tool().to_owned()];
        info.current_continues_pattern = info.pattern_tools.iter().any(|name| name == tool);
    }

    if info.similar_calls_count >= limits.max_retries {
        info.loop_detected = true;
        info.pattern = Some(format!(
            "Repeated call: {tool} ({} times)",
            info.similar_calls_count
        ));
        info.pattern_tools = vec![tool.to_owned()];
        info.current_continues_pattern = true;
    }

    if info.consecutive_failures >= limits.max_consecutive_failures {
        info.loop_detected = true;
        info.pattern = Some(format!(
            "Consecutive failures: {tool} ({} times)",
            info.consecutive_failures
        ));
        info.pattern_tools = vec![tool.to_owned()];
        info.current_continues_pattern = true;
    }

    info
}

fn entry_fingerprint(entry: &HistoryEntry) -> String {
    fingerprint(entry.tool(), entry.input())
}

const READ_ONLY_PHRASES: &[&str] = &["just read", "only read", "examine", "look at", "check the"];

const WRITE_TOOLS: &[&str] = &["Write", "Edit", "Bash"];

static PLANNED_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:file|read|edit|write)\s+[`"']?([^\s`"']+\.\w+)[`"']?"#)
        .expect("planned file pattern compiles")
});

/// Flags a call that contradicts the stated plan.
///
/// A write-class tool contradicts a plan containing a read-only phrase. A
/// plan naming a file contradicts a call whose `file_path` neither ends in
/// nor contains that name. Without plan text nothing is reported.
#[must_use]
pub fn detect_contradiction(plan: Option<&str>, call: &ToolCall) -> Option<String> {
    let plan = plan.filter(|plan| !plan.is_empty())?;
    let tool = call.tool();

    if WRITE_TOOLS.contains(&tool) {
        let lowered = plan.to_lowercase();
        if let Some(phrase) = READ_ONLY_PHRASES
            .iter()
            .find(|phrase| lowered.contains(*phrase))
        {
            return Some(format!(
                "Plan indicates read-only operation (\"{phrase}\") but attempting {tool}"
            ));
        }
    }

    let planned = PLANNED_FILE.captures(plan)?.get(1)?.as_str();
    let path = call.str_field("file_path").filter(|path| !path.is_empty())?;
    let actual = path.rsplit('/').next().unwrap_or(path);

    (planned != actual && !path.contains(planned))
        .then(|| format!("Plan mentions \"{planned}\" but accessing \"{actual}\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 10_000_000;

    fn entry(tool: &str, input: Value, age: i64, failed: bool) -> HistoryEntry {
        let entry = HistoryEntry::at(tool, &input, NOW - age);
        if failed {
            entry.with_failure(Some("boom".into()))
        } else {
            entry
        }
    }

    fn detect(entries: Vec<HistoryEntry>, call: ToolCall) -> LoopInfo {
        detect_loop(&History::from_entries(entries), &call, &Limits::default(), NOW)
    }

    fn oscillation() -> Vec<HistoryEntry> {
        vec![
            entry("Read", json!({ "file_path": "/a" }), 4_000, false),
            entry("Edit", json!({ "file_path": "/a" }), 3_000, false),
            entry("Read", json!({ "file_path": "/b" }), 2_000, false),
            entry("Edit", json!({ "file_path": "/b" }), 1_000, false),
        ]
    }

    #[test]
    fn hallucination_rules() {
        assert!(is_hallucinated(None));
        assert!(is_hallucinated(Some("")));
        assert!(is_hallucinated(Some("mcp__server")));
        assert!(!is_hallucinated(Some("mcp__server__tool")));
        assert!(!is_hallucinated(Some("mcp__a__b__c")));
        assert!(!is_hallucinated(Some("Read")));
        assert!(is_hallucinated(Some("ReadFileFast")));
    }

    #[test]
    fn malformed_input_messages() {
        assert!(detect_malformed_input(&json!({})).is_empty());
        assert_eq!(detect_malformed_input(&Value::Null), ["Input is null or undefined"]);
        assert_eq!(
            detect_malformed_input(&json!([1])),
            ["Input is an array, expected object"]
        );
        assert_eq!(
            detect_malformed_input(&json!("text")),
            ["Input is not an object (got string)"]
        );
        assert_eq!(
            detect_malformed_input(&json!(3)),
            ["Input is not an object (got number)"]
        );
    }

    #[test]
    fn fingerprints_use_key_fields_and_loose_coercion() {
        assert_eq!(
            fingerprint("Edit", &json!({ "file_path": "/a", "old_string": "x", "new_string": "y" })),
            "Edit:/a|x"
        );
        assert_eq!(fingerprint("Glob", &json!({ "pattern": "*.rs" })), "Glob:*.rs|");
        assert_eq!(
            fingerprint(
                "mcp__s__t",
                &json!({ "z": 0, "a": [1, "b", null], "m": { "k": 1 }, "ignored": 4 })
            ),
            "mcp__s__t:|1,b,|[object Object]"
        );
        assert_eq!(fingerprint("Custom", &json!({ "flag": true, "off": false })), "Custom:true|");
        assert_eq!(fingerprint("Custom", &json!("raw")), "Custom:");
    }

    #[test]
    fn integral_floats_fingerprint_like_integers() {
        assert_eq!(
            fingerprint("Custom", &json!({ "n": 1.0 })),
            fingerprint("Custom", &json!({ "n": 1 }))
        );
        assert_eq!(fingerprint("Custom", &json!({ "n": 1.0, "l": [2.0, 2.5] })), "Custom:1|2,2.5");
        assert_eq!(fingerprint("Custom", &json!({ "n": 1.5 })), "Custom:1.5");
        assert_eq!(fingerprint("Custom", &json!({ "n": -0.0 })), "Custom:");
    }

    #[test]
    fn empty_history_yields_default() {
        let info = detect(Vec::new(), ToolCall::new("Read", json!({})));
        assert_eq!(info, LoopInfo::default());
    }

    #[test]
    fn oscillation_continued_by_pattern_tool() {
        let info = detect(oscillation(), ToolCall::new("Read", json!({ "file_path": "/c" })));
        assert!(info.loop_detected);
        assert_eq!(info.pattern.as_deref(), Some("Oscillation: Read <-> Edit"));
        assert_eq!(info.pattern_tools, ["Read", "Edit"]);
        assert!(info.current_continues_pattern);
    }

    #[test]
    fn oscillation_broken_by_other_tool() {
        let info = detect(oscillation(), ToolCall::new("Bash", json!({ "command": "ls" })));
        assert!(info.loop_detected);
        assert_eq!(info.pattern_tools, ["Read", "Edit"]);
        assert!(!info.current_continues_pattern);
    }

    #[test]
    fn consecutive_failures_count_trailing_same_tool_run() {
        let entries = vec![
            entry("Edit", json!({ "file_path": "/x" }), 5_000, true),
            entry("Read", json!({ "file_path": "/x" }), 4_000, false),
            entry("Edit", json!({ "file_path": "/a" }), 3_000, true),
            entry("Edit", json!({ "file_path": "/b" }), 2_000, true),
            entry("Edit", json!({ "file_path": "/c" }), 1_000, true),
        ];
        let info = detect(entries, ToolCall::new("Edit", json!({ "file_path": "/d" })));
        assert_eq!(info.consecutive_failures, 3);
        assert!(info.loop_detected);
        assert_eq!(info.pattern.as_deref(), Some("Consecutive failures: Edit (3 times)"));
        assert_eq!(info.pattern_tools, ["Edit"]);
        assert!(info.current_continues_pattern);
    }

    #[test]
    fn failure_run_resets_on_success() {
        let entries = vec![
            entry("Edit", json!({}), 3_000, true),
            entry("Edit", json!({}), 2_000, false),
            entry("Edit", json!({}), 1_000, true),
        ];
        let info = detect(entries, ToolCall::new("Edit", json!({})));
        assert_eq!(info.consecutive_failures, 1);
    }

    #[test]
    fn repetition_triggers_at_retry_ceiling() {
        let call = json!({ "command": "cargo build" });
        let entries: Vec<_> = (1..=5)
            .map(|age| entry("Bash", call.clone(), age * 1_000, false))
            .collect();

        let info = detect(entries[..4].to_vec(), ToolCall::new("Bash", call.clone()));
        assert_eq!(info.similar_calls_count, 4);
        assert!(!info.loop_detected);

        let info = detect(entries, ToolCall::new("Bash", call));
        assert_eq!(info.similar_calls_count, 5);
        assert!(info.loop_detected);
        assert_eq!(info.pattern.as_deref(), Some("Repeated call: Bash (5 times)"));
        assert!(info.current_continues_pattern);
    }

    #[test]
    fn entries_outside_window_are_ignored() {
        let stale = Limits::default().oscillation_window_ms + 1;
        let mut entries = oscillation();
        for item in &mut entries {
            *item = HistoryEntry::at(item.tool(), item.input(), NOW - stale);
        }
        let info = detect(entries, ToolCall::new("Read", json!({ "file_path": "/a" })));
        assert!(!info.loop_detected);
        assert_eq!(info.similar_calls_count, 0);
        assert!(info.pattern_tools.is_empty());
    }

    #[test]
    fn long_inputs_match_their_stored_summary() {
        let command = "x".repeat(500);
        let entries: Vec<_> = (1..=5)
            .map(|age| entry("Bash", json!({ "command": command }), age * 1_000, false))
            .collect();
        let info = detect(entries, ToolCall::new("Bash", json!({ "command": command })));
        assert_eq!(info.similar_calls_count, 5);
    }

    #[test]
    fn contradiction_requires_plan_text() {
        let call = ToolCall::new("Write", json!({ "file_path": "/a" }));
        assert_eq!(detect_contradiction(None, &call), None);
    }

    #[test]
    fn read_only_plan_contradicts_write_tools() {
        let found = detect_contradiction(
            Some("I will just read the config"),
            &ToolCall::new("Edit", json!({ "file_path": "/config" })),
        );
        assert_eq!(
            found.as_deref(),
            Some("Plan indicates read-only operation (\"just read\") but attempting Edit")
        );
        assert_eq!(
            detect_contradiction(Some("Examine the logs"), &ToolCall::new("Read", json!({}))),
            None
        );
    }

    #[test]
    fn named_file_mismatch_is_reported() {
        let found = detect_contradiction(
            Some("Update file `main.rs` next"),
            &ToolCall::new("Read", json!({ "file_path": "/src/lib.rs" })),
        );
        assert_eq!(
            found.as_deref(),
            Some("Plan mentions \"main.rs\" but accessing \"lib.rs\"")
        );
        assert_eq!(
            detect_contradiction(
                Some("Update file `main.rs` next"),
                &ToolCall::new("Read", json!({ "file_path": "/src/main.rs" }))
            ),
            None
        );
    }
}
