//! Tool-result failure detection for the post-call hook.
//!
//! The host reports errors in several shapes, so the primary `tool_result`
//! is inspected first and a fixed list of alternative payload locations after
//! it. String content is matched against a labeled table of error phrases.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::protocol::PostToolUseRequest;

const PATTERN_DETECTED: &str = "Error pattern detected in output";

/// Labeled error phrase matched case-insensitively against tool output.
#[derive(Debug)]
pub struct ErrorPattern {
    label: &'static str,
    pattern: Regex,
}

impl ErrorPattern {
    fn new(label: &'static str, pattern: &str) -> Self {
        Self {
            label,
            pattern: Regex::new(pattern).expect("error pattern compiles"),
        }
    }

    /// Returns the rule label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Returns true when the text contains the phrase.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

static ERROR_PATTERNS: LazyLock<Vec<ErrorPattern>> = LazyLock::new(|| {
    vec![
        ErrorPattern::new("error prefix", r"(?i)error:"),
        ErrorPattern::new("failed prefix", r"(?i)failed:"),
        ErrorPattern::new("exception prefix", r"(?i)exception:"),
        ErrorPattern::new("not found", r"(?i)not found"),
        ErrorPattern::new("permission denied", r"(?i)permission denied"),
        ErrorPattern::new("missing file", r"(?i)no such file"),
        ErrorPattern::new("windows permission error", r"(?i)eperm"),
        ErrorPattern::new("unix permission error", r"(?i)eacces"),
        ErrorPattern::new("missing entry error", r"(?i)enoent"),
        ErrorPattern::new("operation not permitted", r"(?i)operation not permitted"),
    ]
});

/// Returns the error phrase table in evaluation order.
#[must_use]
pub fn error_patterns() -> &'static [ErrorPattern] {
    &ERROR_PATTERNS
}

/// Returns the label of the first error phrase found in `text`.
#[must_use]
pub fn matching_pattern(text: &str) -> Option<&'static str> {
    error_patterns()
        .iter()
        .find(|rule| rule.matches(text))
        .map(ErrorPattern::label)
}

/// Outcome of failure detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureInfo {
    /// Whether the tool call failed.
    pub failed: bool,
    /// Why the call is considered failed.
    pub reason: Option<String>,
}

impl FailureInfo {
    /// A successful call.
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    /// A failed call with the given reason.
    #[must_use]
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            failed: true,
            reason: Some(reason.into()),
        }
    }
}

/// Loose truthiness: null, false, zero and the empty string are falsy.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn scan_text(text: &str) -> Option<FailureInfo> {
    matching_pattern(text).map(|_| FailureInfo::failure(PATTERN_DETECTED))
}

fn inspect_result(result: &Value) -> Option<FailureInfo> {
    match result {
        Value::String(text) => scan_text(text),
        Value::Object(fields) => {
            if let Some(error) = fields.get("error").filter(|error| truthy(error)) {
                return Some(FailureInfo::failure(
                    error.as_str().unwrap_or("Error field present in result"),
                ));
            }
            if fields.get("success") == Some(&Value::Bool(false)) {
                let message = fields
                    .get("message")
                    .and_then(Value::as_str)
                    .filter(|message| !message.is_empty())
                    .unwrap_or("Success field is false");
                return Some(FailureInfo::failure(message));
            }
            None
        }
        _ => None,
    }
}

fn inspect_location(location: &Value) -> Option<FailureInfo> {
    match location {
        Value::String(text) => scan_text(text),
        Value::Object(fields) => fields
            .get("message")
            .and_then(Value::as_str)
            .and_then(scan_text),
        _ => None,
    }
}

fn alternative_locations(request: &PostToolUseRequest) -> [Option<&Value>; 5] {
    let response = request.field("tool_response");
    [
        request.field("error"),
        response.and_then(|response| response.get("error")),
        response.and_then(|response| response.get("stderr")),
        response.and_then(|response| response.get("stdout")),
        request
            .field("result")
            .and_then(|result| result.get("error")),
    ]
}

/// Decides whether the reported tool call failed.
#[must_use]
pub fn detect_failure(request: &PostToolUseRequest) -> FailureInfo {
    if request.is_failure_event() {
        return failure_event(request);
    }

    if let Some(info) = request.tool_result().and_then(inspect_result) {
        return info;
    }

    if let Some(info) = alternative_locations(request)
        .into_iter()
        .flatten()
        .filter(|location| truthy(location))
        .find_map(inspect_location)
    {
        return info;
    }

    match request.field("error") {
        Some(error) if request.tool_result().is_none() && truthy(error) => {
            FailureInfo::failure(error.as_str().unwrap_or("Tool returned error"))
        }
        _ => FailureInfo::success(),
    }
}

fn failure_event(request: &PostToolUseRequest) -> FailureInfo {
    let error = request.field("error");
    let reason = error
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .or_else(|| error.and_then(Value::as_str).filter(|text| !text.is_empty()))
        .unwrap_or("Tool execution failed");
    FailureInfo::failure(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detect(payload: Value) -> FailureInfo {
        detect_failure(&PostToolUseRequest::from_value(payload).unwrap())
    }

    #[test]
    fn string_results_are_pattern_matched() {
        assert_eq!(
            detect(json!({ "tool_result": "cat: foo: No such file or directory" })),
            FailureInfo::failure(PATTERN_DETECTED)
        );
        assert_eq!(
            detect(json!({ "tool_result": "EACCES while opening" })),
            FailureInfo::failure(PATTERN_DETECTED)
        );
        assert_eq!(detect(json!({ "tool_result": "all good" })), FailureInfo::success());
    }

    #[test]
    fn object_results_use_error_and_success_fields() {
        assert_eq!(
            detect(json!({ "tool_result": { "error": "disk full" } })),
            FailureInfo::failure("disk full")
        );
        assert_eq!(
            detect(json!({ "tool_result": { "error": { "code": 5 } } })),
            FailureInfo::failure("Error field present in result")
        );
        assert_eq!(
            detect(json!({ "tool_result": { "success": false, "message": "nope" } })),
            FailureInfo::failure("nope")
        );
        assert_eq!(
            detect(json!({ "tool_result": { "success": false } })),
            FailureInfo::failure("Success field is false")
        );
        assert_eq!(
            detect(json!({ "tool_result": { "error": "", "success": true } })),
            FailureInfo::success()
        );
    }

    #[test]
    fn alternative_locations_are_scanned() {
        assert_eq!(
            detect(json!({ "tool_result": "ok", "tool_response": { "stderr": "Permission denied" } })),
            FailureInfo::failure(PATTERN_DETECTED)
        );
        assert_eq!(
            detect(json!({ "tool_result": "ok", "result": { "error": { "message": "Error: boom" } } })),
            FailureInfo::failure(PATTERN_DETECTED)
        );
        assert_eq!(
            detect(json!({ "tool_result": "ok", "tool_response": { "stdout": "listing done" } })),
            FailureInfo::success()
        );
    }

    #[test]
    fn bare_error_without_result() {
        assert_eq!(
            detect(json!({ "error": "timed out" })),
            FailureInfo::failure("timed out")
        );
        assert_eq!(
            detect(json!({ "error": { "code": 1 } })),
            FailureInfo::failure("Tool returned error")
        );
        assert_eq!(
            detect(json!({ "tool_result": "fine", "error": "timed out" })),
            FailureInfo::success()
        );
    }

    #[test]
    fn failure_event_shortcut() {
        assert_eq!(
            detect(json!({
                "hook_event_name": "PostToolUseFailure",
                "tool_result": "fine",
                "error": { "message": "killed" },
            })),
            FailureInfo::failure("killed")
        );
        assert_eq!(
            detect(json!({ "hook_event_name": "PostToolUseFailure", "error": "crashed" })),
            FailureInfo::failure("crashed")
        );
        assert_eq!(
            detect(json!({ "hook_event_name": "PostToolUseFailure" })),
            FailureInfo::failure("Tool execution failed")
        );
    }

    #[test]
    fn pattern_labels_are_reported() {
        assert_eq!(matching_pattern("Operation not permitted"), Some("operation not permitted"));
        assert_eq!(matching_pattern("ENOENT"), Some("missing entry error"));
        assert_eq!(matching_pattern("fine"), None);
        assert_eq!(error_patterns().len(), 10);
    }
}
