//! Pre-call pipeline: validate, detect, decide, record.

use governor_memory::{History, HistoryEntry, now_millis};
use governor_policy::{
    Correction, Decision, ErrorVector, InvalidValue, check_safety, detect_contradiction,
    detect_loop, detect_malformed_input, is_allowed, is_hallucinated, validate,
};
use governor_primitives::{SessionId, ToolCall};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::Governor;
use crate::protocol::{PreToolUseRequest, PreToolUseResponse};

const MISSING_TOOL: &str = "<missing>";

impl Governor {
    /// Runs the pre-call pipeline over a parsed request.
    ///
    /// Store failures are logged and never change the decision.
    pub async fn pre_tool_use(&self, request: &PreToolUseRequest) -> PreToolUseResponse {
        let tool = request.tool_name();
        let input = request.tool_input();
        let call = request.call();
        debug!(
            tool = tool.unwrap_or(MISSING_TOOL),
            session = request.session().map(SessionId::as_str),
            "pre-call request"
        );

        let mut errors = self.error_vector(tool, &call);

        let history = self.load_history(request.session()).await;
        let loop_info = detect_loop(&history, &call, self.config.limits(), now_millis());
        errors.loop_detected = loop_info.loop_detected;

        let plan = self.plan_source.plan_text(request.session(), &call).await;
        errors.contradiction = detect_contradiction(plan.as_deref(), &call);

        let decision = self.controller.decide(&errors, Some(&loop_info));
        self.observer
            .on_decision(request.session(), tool.unwrap_or(MISSING_TOOL), &decision);

        if let Some(session) = request.session()
            && let Err(err) = self
                .store
                .append_and_trim(session, HistoryEntry::record(call.tool(), input))
                .await
        {
            warn!(session = %session, error = %err, "failed to record call");
        }

        let response = render(&decision, &errors, input);
        if self.config.debug() {
            response.with_debug(json!({
                "hook": "pre",
                "toolName": tool,
                "errorVector": errors,
                "loopInfo": loop_info,
                "decision": {
                    "action": decision.kind(),
                    "reason": decision.reason(),
                },
            }))
        } else {
            response
        }
    }

    /// Collects the structural and safety findings that need no history.
    fn error_vector(&self, tool: Option<&str>, call: &ToolCall) -> ErrorVector {
        let mut errors = ErrorVector::new();
        let input = call.input();

        let issues = detect_malformed_input(input);
        if !issues.is_empty() {
            errors
                .invalid_values
                .push(InvalidValue::with_reason("tool_input", issues.join("; ")));
        }

        let shown = tool.unwrap_or(MISSING_TOOL);
        if is_hallucinated(tool) {
            errors.forbidden_actions.push(format!("Unknown tool: {shown}"));
        }
        if !tool.is_some_and(is_allowed) {
            errors
                .forbidden_actions
                .push(format!("Tool not in allowed list: {shown}"));
        }

        errors.absorb_schema(validate(call.tool(), input));
        errors
            .forbidden_actions
            .extend(check_safety(call, self.config.limits()));
        errors
    }

    pub(crate) async fn load_history(&self, session: Option<&SessionId>) -> History {
        let Some(session) = session else {
            return History::new();
        };
        match self.store.load(session).await {
            Ok(history) => history,
            Err(err) => {
                warn!(session = %session, error = %err, "history unavailable, using empty history");
                History::new()
            }
        }
    }
}

fn render(decision: &Decision, errors: &ErrorVector, input: &Value) -> PreToolUseResponse {
    let message = decision.system_message().map(str::to_owned);
    if decision.blocks() {
        PreToolUseResponse::deny(errors.clone()).with_system_message(message)
    } else if let Some(corrections) = decision.corrections() {
        PreToolUseResponse::allow()
            .with_updated_input(apply_corrections(input, corrections))
            .with_system_message(message)
    } else {
        PreToolUseResponse::allow().with_system_message(message)
    }
}

/// Merges non-null corrections into a copy of the input.
#[must_use]
pub fn apply_corrections(input: &Value, corrections: &[Correction]) -> Value {
    if corrections.is_empty() {
        return input.clone();
    }
    let mut corrected = input.as_object().cloned().unwrap_or_else(Map::new);
    for Correction { field, correction } in corrections {
        if let Some(value) = correction.as_ref().filter(|value| !value.is_null()) {
            corrected.insert(field.clone(), value.clone());
        }
    }
    Value::Object(corrected)
}
