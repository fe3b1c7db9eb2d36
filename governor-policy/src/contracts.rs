//! Evaluation contracts passed between detectors and the controller.

use serde::{Deserialize, Serialize};

use crate::schema::{FieldType, SchemaReport};

/// One invalid field reported for a tool call.
///
/// Type mismatches carry `expected`/`got`; forbidden fields and malformed
/// inputs carry `reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidValue {
    /// Offending field name.
    pub field: String,
    /// Expected type name for type mismatches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Observed type name for type mismatches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub got: Option<String>,
    /// Free-form reason for non-type findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl InvalidValue {
    /// Value whose type differs from the declared one.
    #[must_use]
    pub fn type_mismatch(field: impl Into<String>, expected: FieldType, got: &str) -> Self {
        Self {
            field: field.into(),
            expected: Some(expected.as_str().to_owned()),
            got: Some(got.to_owned()),
            reason: None,
        }
    }

    /// Field that must not be present.
    #[must_use]
    pub fn forbidden(field: impl Into<String>) -> Self {
        Self::with_reason(field, "forbidden")
    }

    /// Finding described by a reason only.
    #[must_use]
    pub fn with_reason(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            expected: None,
            got: None,
            reason: Some(reason.into()),
        }
    }

    /// Returns true when the finding is a forbidden field.
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        self.reason.as_deref() == Some("forbidden")
    }
}

/// Aggregated structural and safety findings for a single call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorVector {
    /// Required fields that were absent or null.
    pub missing_fields: Vec<String>,
    /// Type mismatches, forbidden fields and malformed-input findings.
    pub invalid_values: Vec<InvalidValue>,
    /// Hallucinated tools, unlisted tools and safety violations.
    pub forbidden_actions: Vec<String>,
    /// Mirrors [`LoopInfo::loop_detected`] for reporting.
    pub loop_detected: bool,
    /// Mismatch between the stated plan and the call, if any.
    pub contradiction: Option<String>,
}

impl ErrorVector {
    /// Creates an empty error vector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges the findings of a schema validation.
    pub fn absorb_schema(&mut self, report: SchemaReport) {
        self.missing_fields.extend(report.missing_fields);
        self.invalid_values.extend(report.invalid_values);
    }

    /// Returns true when no finding of any kind is present.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing_fields.is_empty()
            && self.invalid_values.is_empty()
            && self.forbidden_actions.is_empty()
            && !self.loop_detected
            && self.contradiction.is_none()
    }
}

/// Result of loop and oscillation detection over a session history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopInfo {
    /// True when any loop trigger fired.
    pub loop_detected: bool,
    /// Trailing run of failed calls to the current tool inside the window.
    pub consecutive_failures: usize,
    /// Windowed calls sharing the current call's fingerprint.
    pub similar_calls_count: usize,
    /// Description of the last trigger that fired.
    pub pattern: Option<String>,
    /// Tools involved in the pattern; empty unless a loop was detected.
    pub pattern_tools: Vec<String>,
    /// Whether the current call would continue the detected pattern.
    pub current_continues_pattern: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invalid_value_serializes_only_present_keys() {
        let mismatch = InvalidValue::type_mismatch("limit", FieldType::Number, "string");
        assert_eq!(
            serde_json::to_value(&mismatch).unwrap(),
            json!({ "field": "limit", "expected": "number", "got": "string" })
        );

        let forbidden = InvalidValue::forbidden("secret");
        assert!(forbidden.is_forbidden());
        assert_eq!(
            serde_json::to_value(&forbidden).unwrap(),
            json!({ "field": "secret", "reason": "forbidden" })
        );
    }

    #[test]
    fn error_vector_uses_snake_case_wire_names() {
        let mut vector = ErrorVector::new();
        assert!(vector.is_clean());
        vector.forbidden_actions.push("Unknown tool: Nope".into());

        let value = serde_json::to_value(&vector).unwrap();
        assert_eq!(value["forbidden_actions"][0], "Unknown tool: Nope");
        assert_eq!(value["contradiction"], serde_json::Value::Null);
        assert_eq!(value["loop_detected"], false);
        assert!(!vector.is_clean());
    }
}
