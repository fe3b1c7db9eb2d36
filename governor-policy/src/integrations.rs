//! Extension points supplied by embedders.
//!
//! Neither capability has a real implementation yet: the hooks use
//! [`NoPlanSource`] and [`NoAutoCorrection`], which keep contradiction
//! detection and auto-correction switched off.

use async_trait::async_trait;
use governor_primitives::{SessionId, ToolCall};
use serde_json::Value;

use crate::contracts::InvalidValue;

/// Source of the agent's stated plan for a session.
#[async_trait]
pub trait PlanSource: Send + Sync {
    /// Returns the current plan text, if one is known.
    async fn plan_text(&self, session: Option<&SessionId>, call: &ToolCall) -> Option<String>;
}

/// Plan source that never knows a plan.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPlanSource;

#[async_trait]
impl PlanSource for NoPlanSource {
    async fn plan_text(&self, _session: Option<&SessionId>, _call: &ToolCall) -> Option<String> {
        None
    }
}

/// Strategy deciding which invalid values can be repaired in place.
pub trait CorrectionStrategy: Send + Sync {
    /// Returns true when `invalid` can be corrected without asking the agent.
    fn can_correct(&self, invalid: &InvalidValue) -> bool;

    /// Suggests a replacement value for a correctable field.
    fn suggest(&self, invalid: &InvalidValue) -> Option<Value>;
}

/// Strategy that treats every invalid value as uncorrectable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAutoCorrection;

impl CorrectionStrategy for NoAutoCorrection {
    fn can_correct(&self, _invalid: &InvalidValue) -> bool {
        false
    }

    fn suggest(&self, _invalid: &InvalidValue) -> Option<Value> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn default_plan_source_is_silent() {
        let call = ToolCall::new("Edit", json!({ "file_path": "/a" }));
        let session = SessionId::new("plan").unwrap();
        assert_eq!(NoPlanSource.plan_text(Some(&session), &call).await, None);
        assert_eq!(NoPlanSource.plan_text(None, &call).await, None);
    }

    #[test]
    fn default_strategy_never_corrects() {
        let invalid = InvalidValue::with_reason("limit", "bad");
        assert!(!NoAutoCorrection.can_correct(&invalid));
        assert_eq!(NoAutoCorrection.suggest(&invalid), None);
    }
}
