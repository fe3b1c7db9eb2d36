//! Post-call pipeline: record failures and damp repeated trouble.

use governor_memory::{History, now_millis};
use governor_policy::{LoopInfo, MESSAGE_PREFIX, calculate_backoff, detect_loop};
use serde_json::json;
use tracing::{debug, warn};

use crate::Governor;
use crate::failure::{FailureInfo, detect_failure};
use crate::protocol::{PostToolUseRequest, PostToolUseResponse};

/// Windowed failures of one tool from which the feedback adds a warning.
const REPEATED_FAILURE_WARNING: usize = 2;

impl Governor {
    /// Runs the post-call pipeline over a parsed request.
    pub async fn post_tool_use(&self, request: &PostToolUseRequest) -> PostToolUseResponse {
        let call = request.call();
        let failure = detect_failure(request);
        debug!(
            tool = call.tool(),
            event = request.event(),
            failed = failure.failed,
            "post-call request"
        );

        if failure.failed
            && let Some(session) = request.session()
            && let Err(err) = self
                .store
                .mark_last_failed(session, call.tool(), failure.reason.clone())
                .await
        {
            warn!(session = %session, error = %err, "failed to record failure");
        }

        let now = now_millis();
        let history = self.load_history(request.session()).await;
        let loop_info = detect_loop(&history, &call, self.config.limits(), now);
        let damping = self.controller.should_apply_damping(Some(&loop_info));

        let mut backoff_ms = None;
        let message = if damping {
            let backoff = calculate_backoff(loop_info.consecutive_failures);
            backoff_ms = Some(backoff);
            Some(self.damping_message(&history, &loop_info, backoff, now))
        } else if failure.failed {
            Some(self.feedback_message(&history, call.tool(), &failure, now))
        } else {
            None
        };

        let response = PostToolUseResponse::default().with_system_message(message);
        if self.config.debug() {
            response.with_debug(json!({
                "hook": "post",
                "toolName": request.tool_name(),
                "hookEvent": request.event(),
                "failureInfo": failure,
                "loopInfo": loop_info,
                "dampingApplied": damping,
                "backoffMs": backoff_ms,
            }))
        } else {
            response
        }
    }

    fn damping_message(
        &self,
        history: &History,
        info: &LoopInfo,
        backoff_ms: u64,
        now: i64,
    ) -> String {
        let stats = history.stats(self.config.limits().oscillation_window_ms, now);
        [
            format!("{MESSAGE_PREFIX} Damping applied due to repeated issues."),
            String::new(),
            format!(
                "Pattern: {}",
                info.pattern.as_deref().unwrap_or("Multiple failures detected")
            ),
            format!("Consecutive failures: {}", info.consecutive_failures),
            format!("Recommended backoff: {backoff_ms} ms"),
            String::new(),
            "Recommendation: Take a different approach before retrying.".to_owned(),
            String::new(),
            "History stats:".to_owned(),
            format!("  - Recent calls: {}", stats.recent_calls),
            format!("  - Total this session: {}", stats.total_calls),
        ]
        .join("\n")
    }

    fn feedback_message(
        &self,
        history: &History,
        tool: &str,
        failure: &FailureInfo,
        now: i64,
    ) -> String {
        let stats = history.stats(self.config.limits().oscillation_window_ms, now);
        let failures = stats.failure_counts.get(tool).copied().unwrap_or_default();

        let mut lines = vec![
            format!("{MESSAGE_PREFIX} Tool execution feedback."),
            String::new(),
        ];
        if let Some(reason) = &failure.reason {
            lines.push(format!("ISSUE: {reason}"));
            lines.push(String::new());
        }
        if failures >= REPEATED_FAILURE_WARNING {
            lines.push(format!("WARNING: {tool} has failed {failures} times recently."));
            lines.push(String::new());
            lines.push("Consider:".to_owned());
            lines.push("1. Checking if the inputs are correct".to_owned());
            lines.push("2. Verifying prerequisites are met".to_owned());
            lines.push("3. Trying an alternative approach".to_owned());
        }
        lines.join("\n")
    }
}
