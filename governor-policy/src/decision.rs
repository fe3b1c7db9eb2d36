//! Decision types returned by the controller.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Describes the outcome of evaluating a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Call proceeds unchanged.
    Allow,
    /// Call is rejected outright.
    Deny,
    /// Call proceeds with corrected input.
    Correct,
    /// Call is blocked because it continues a loop; the agent must change approach.
    Escalate,
}

impl DecisionKind {
    /// Returns the lowercase name of the decision.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Correct => "correct",
            Self::Escalate => "escalate",
        }
    }
}

impl Display for DecisionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replacement value proposed for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    /// Field to replace.
    pub field: String,
    /// Proposed value; `None` leaves the field untouched.
    pub correction: Option<Value>,
}

/// Structured decision emitted by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    kind: DecisionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    corrections: Option<Vec<Correction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    system_message: Option<String>,
}

impl Decision {
    /// Returns an allow decision, optionally carrying an informational message.
    #[must_use]
    pub fn allow(system_message: Option<String>) -> Self {
        Self {
            kind: DecisionKind::Allow,
            reason: None,
            corrections: None,
            system_message,
        }
    }

    /// Returns a deny decision.
    #[must_use]
    pub fn deny(reason: impl Into<String>, system_message: impl Into<String>) -> Self {
        Self {
            kind: DecisionKind::Deny,
            reason: Some(reason.into()),
            corrections: None,
            system_message: Some(system_message.into()),
        }
    }

    /// Returns an escalate decision.
    #[must_use]
    pub fn escalate(reason: Option<String>, system_message: impl Into<String>) -> Self {
        Self {
            kind: DecisionKind::Escalate,
            reason,
            corrections: None,
            system_message: Some(system_message.into()),
        }
    }

    /// Returns a correct decision with the proposed replacements.
    #[must_use]
    pub fn correct(corrections: Vec<Correction>, system_message: impl Into<String>) -> Self {
        Self {
            kind: DecisionKind::Correct,
            reason: None,
            corrections: Some(corrections),
            system_message: Some(system_message.into()),
        }
    }

    /// Returns the decision kind.
    #[must_use]
    pub fn kind(&self) -> DecisionKind {
        self.kind
    }

    /// Returns true when the call proceeds unchanged.
    #[must_use]
    pub fn is_allow(&self) -> bool {
        self.kind == DecisionKind::Allow
    }

    /// Returns true when the call is rejected.
    #[must_use]
    pub fn is_deny(&self) -> bool {
        self.kind == DecisionKind::Deny
    }

    /// Returns true when the call proceeds with corrected input.
    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.kind == DecisionKind::Correct
    }

    /// Returns true when the call continues a detected loop.
    #[must_use]
    pub fn is_escalate(&self) -> bool {
        self.kind == DecisionKind::Escalate
    }

    /// Returns true when the host must not run the call.
    #[must_use]
    pub fn blocks(&self) -> bool {
        self.is_deny() || self.is_escalate()
    }

    /// Returns the short reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Returns the proposed corrections for correct decisions.
    #[must_use]
    pub fn corrections(&self) -> Option<&[Correction]> {
        self.corrections.as_deref()
    }

    /// Returns the message shown to the agent, if any.
    #[must_use]
    pub fn system_message(&self) -> Option<&str> {
        self.system_message.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decision_helpers_work() {
        let allow = Decision::allow(None);
        assert!(allow.is_allow());
        assert!(!allow.blocks());
        assert_eq!(allow.system_message(), None);

        let deny = Decision::deny("blocked", "message");
        assert!(deny.is_deny());
        assert!(deny.blocks());
        assert_eq!(deny.reason(), Some("blocked"));

        let escalate = Decision::escalate(Some("loop".into()), "stop");
        assert!(escalate.is_escalate());
        assert!(escalate.blocks());

        let correct = Decision::correct(
            vec![Correction {
                field: "limit".into(),
                correction: Some(json!(10)),
            }],
            "fixed",
        );
        assert!(correct.is_correct());
        assert!(!correct.blocks());
        assert_eq!(correct.corrections().map(<[Correction]>::len), Some(1));
        assert_eq!(DecisionKind::Correct.to_string(), "correct");
    }
}
