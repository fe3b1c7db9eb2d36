//! Tool-call policy for the LZ Cybernetics governor.
//!
//! Structural and safety findings are collected into an [`ErrorVector`],
//! history-based patterns into a [`LoopInfo`], and the [`Controller`] turns
//! both into a [`Decision`].

#![warn(missing_docs, clippy::pedantic)]

pub mod contracts;
pub mod controller;
pub mod decision;
pub mod detectors;
pub mod integrations;
pub mod invariants;
pub mod schema;

pub use contracts::{ErrorVector, InvalidValue, LoopInfo};
pub use controller::{
    Controller, MESSAGE_PREFIX, calculate_backoff, calculate_backoff_with_jitter,
};
pub use decision::{Correction, Decision, DecisionKind};
pub use detectors::{
    detect_contradiction, detect_loop, detect_malformed_input, fingerprint, is_hallucinated,
};
pub use integrations::{CorrectionStrategy, NoAutoCorrection, NoPlanSource, PlanSource};
pub use invariants::{
    Limits, SafetyRule, check_safety, dangerous_command_rules, is_allowed, matching_rule,
    sensitive_path_rules,
};
pub use schema::{FieldDefault, FieldType, SchemaReport, ToolSchema, schema_for, validate};
