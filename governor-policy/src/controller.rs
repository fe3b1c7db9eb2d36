//! Decision policy and damping.
//!
//! [`Controller::decide`] maps an error vector and loop information to a
//! [`Decision`] in a fixed priority order:
//!
//! 1. forbidden actions deny;
//! 2. a detected loop that the call continues escalates, while a loop the
//!    call breaks only attaches an informational message and falls through;
//! 3. missing fields deny;
//! 4. invalid values deny unless every one of them is correctable, in which
//!    case the call is corrected;
//! 5. a contradiction denies;
//! 6. otherwise the call is allowed.

use std::sync::Arc;

use rand::Rng;
use tracing::debug;

use crate::contracts::{ErrorVector, InvalidValue, LoopInfo};
use crate::decision::{Correction, Decision};
use crate::integrations::{CorrectionStrategy, NoAutoCorrection};
use crate::invariants::Limits;

/// Prefix of every message the governor shows to the agent.
pub const MESSAGE_PREFIX: &str = "[LZ-CYBERNETICS]";

const BASE_BACKOFF_MS: f64 = 1_000.0;
const MAX_BACKOFF_MS: f64 = 30_000.0;
const MAX_JITTER: f64 = 0.3;

/// Pure decision function over detector output.
#[derive(Clone)]
pub struct Controller {
    limits: Limits,
    corrections: Arc<dyn CorrectionStrategy>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl Controller {
    /// Creates a controller that never auto-corrects.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            corrections: Arc::new(NoAutoCorrection),
        }
    }

    /// Replaces the correction strategy.
    #[must_use]
    pub fn with_correction_strategy(mut self, strategy: Arc<dyn CorrectionStrategy>) -> Self {
        self.corrections = strategy;
        self
    }

    /// Returns the limits used by the damping gate.
    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Decides what happens to a call.
    #[must_use]
    pub fn decide(&self, errors: &ErrorVector, loop_info: Option<&LoopInfo>) -> Decision {
        let decision = self.evaluate(errors, loop_info);
        debug!(
            decision = %decision.kind(),
            reason = decision.reason().unwrap_or("(no reason)"),
            "control decision"
        );
        decision
    }

    fn evaluate(&self, errors: &ErrorVector, loop_info: Option<&LoopInfo>) -> Decision {
        if !errors.forbidden_actions.is_empty() {
            return Decision::deny(
                format!(
                    "Forbidden action detected: {}",
                    errors.forbidden_actions.join(", ")
                ),
                denial_message(errors, Denial::Forbidden),
            );
        }

        let mut notice = None;
        if let Some(info) = loop_info.filter(|info| info.loop_detected) {
            if info.current_continues_pattern {
                return Decision::escalate(info.pattern.clone(), escalation_message(info));
            }
            notice = Some(breakout_message(info));
        }

        if !errors.missing_fields.is_empty() {
            return Decision::deny(
                format!(
                    "Missing required fields: {}",
                    errors.missing_fields.join(", ")
                ),
                denial_message(errors, Denial::Missing),
            );
        }

        if !errors.invalid_values.is_empty() {
            let (correctable, uncorrectable): (Vec<&InvalidValue>, Vec<&InvalidValue>) = errors
                .invalid_values
                .iter()
                .partition(|invalid| self.corrections.can_correct(invalid));

            if !uncorrectable.is_empty() {
                let fields: Vec<&str> = uncorrectable
                    .iter()
                    .map(|invalid| invalid.field.as_str())
                    .collect();
                return Decision::deny(
                    format!("Invalid values: {}", fields.join(", ")),
                    denial_message(errors, Denial::Invalid),
                );
            }

            let corrections: Vec<Correction> = correctable
                .into_iter()
                .map(|invalid| Correction {
                    field: invalid.field.clone(),
                    correction: self.corrections.suggest(invalid),
                })
                .collect();
            let message = correction_message(&corrections);
            return Decision::correct(corrections, message);
        }

        if let Some(contradiction) = &errors.contradiction {
            return Decision::deny(contradiction.clone(), contradiction_message(contradiction));
        }

        Decision::allow(notice)
    }

    /// Returns true when repeated trouble warrants backing off.
    ///
    /// Any one of the failure ceiling, the retry ceiling or a detected loop
    /// is sufficient.
    #[must_use]
    pub fn should_apply_damping(&self, loop_info: Option<&LoopInfo>) -> bool {
        loop_info.is_some_and(|info| {
            info.consecutive_failures >= self.limits.max_consecutive_failures
                || info.similar_calls_count >= self.limits.max_retries
                || info.loop_detected
        })
    }
}

/// Recommended delay in milliseconds before retrying after `failure_count`
/// failures, with up to 30% random jitter.
#[must_use]
pub fn calculate_backoff(failure_count: usize) -> u64 {
    let jitter = rand::thread_rng().gen_range(0.0..=MAX_JITTER);
    calculate_backoff_with_jitter(failure_count, jitter)
}

/// Deterministic form of [`calculate_backoff`].
///
/// Computes `min(1000 * 2^(n-1) * (1 + jitter), 30000)` rounded to whole
/// milliseconds; `jitter` is clamped to `[0, 0.3]`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn calculate_backoff_with_jitter(failure_count: usize, jitter: f64) -> u64 {
    let exponent = i32::try_from(failure_count)
        .unwrap_or(i32::MAX)
        .saturating_sub(1);
    let exponential = BASE_BACKOFF_MS * 2_f64.powi(exponent);
    let jittered = exponential * (1.0 + jitter.clamp(0.0, MAX_JITTER));
    jittered.min(MAX_BACKOFF_MS).round() as u64
}

#[derive(Clone, Copy)]
enum Denial {
    Forbidden,
    Missing,
    Invalid,
}

fn denial_message(errors: &ErrorVector, denial: Denial) -> String {
    let mut lines = vec![
        format!("{MESSAGE_PREFIX} Tool call validation failed."),
        String::new(),
    ];

    match denial {
        Denial::Forbidden => {
            lines.push("FORBIDDEN ACTION DETECTED:".into());
            lines.extend(errors.forbidden_actions.iter().map(|action| format!("  - {action}")));
            lines.push(String::new());
            lines.push("This action violates safety constraints. Please use a different approach.".into());
        }
        Denial::Missing => {
            lines.push("MISSING REQUIRED FIELDS:".into());
            lines.extend(errors.missing_fields.iter().map(|field| format!("  - {field}")));
            lines.push(String::new());
            lines.push("Please provide all required fields and retry.".into());
        }
        Denial::Invalid => {
            lines.push("INVALID VALUES:".into());
            lines.extend(errors.invalid_values.iter().map(describe_invalid));
            lines.push(String::new());
            lines.push("Please correct the field types and retry.".into());
        }
    }

    lines.join("\n")
}

fn describe_invalid(invalid: &InvalidValue) -> String {
    let field = &invalid.field;
    match (&invalid.expected, &invalid.got, &invalid.reason) {
        _ if invalid.is_forbidden() => format!("  - {field}: forbidden field"),
        (Some(expected), Some(got), _) => format!("  - {field}: expected {expected}, got {got}"),
        (_, _, Some(reason)) => format!("  - {field}: {reason}"),
        _ => format!("  - {field}: invalid value"),
    }
}

fn escalation_message(info: &LoopInfo) -> String {
    [
        format!("{MESSAGE_PREFIX} Oscillation/loop pattern detected."),
        String::new(),
        format!("PATTERN: {}", info.pattern.as_deref().unwrap_or_default()),
        String::new(),
        "The system has detected a repeated failure pattern. To break this cycle:".into(),
        "1. Step back and reconsider the approach".into(),
        "2. Try a fundamentally different strategy".into(),
        "3. Ask the user for clarification if needed".into(),
        String::new(),
        format!("Consecutive failures: {}", info.consecutive_failures),
        format!("Similar calls in window: {}", info.similar_calls_count),
    ]
    .join("\n")
}

fn breakout_message(info: &LoopInfo) -> String {
    let tools = if info.pattern_tools.is_empty() {
        "unknown".to_owned()
    } else {
        info.pattern_tools.join(", ")
    };
    [
        format!("{MESSAGE_PREFIX} Pattern detected but current action allowed."),
        String::new(),
        format!("DETECTED PATTERN: {}", info.pattern.as_deref().unwrap_or_default()),
        format!("PATTERN TOOLS: {tools}"),
        String::new(),
        "Your current action uses a different tool, which breaks the loop.".into(),
        "Proceeding with this approach.".into(),
    ]
    .join("\n")
}

fn contradiction_message(contradiction: &str) -> String {
    [
        format!("{MESSAGE_PREFIX} Contradiction detected between plan and action."),
        String::new(),
        format!("CONTRADICTION: {contradiction}"),
        String::new(),
        "The current action does not match the stated plan. Please either:".into(),
        "1. Update your plan to reflect the intended action".into(),
        "2. Modify the action to match your plan".into(),
    ]
    .join("\n")
}

fn correction_message(corrections: &[Correction]) -> String {
    let mut lines = vec![
        format!("{MESSAGE_PREFIX} Auto-corrections applied."),
        String::new(),
        "The following fields were automatically corrected:".to_owned(),
    ];
    lines.extend(corrections.iter().map(|correction| {
        let value = correction
            .correction
            .as_ref()
            .map_or_else(|| "null".to_owned(), ToString::to_string);
        format!("  - {}: {value}", correction.field)
    }));
    lines.join("\n")
}
