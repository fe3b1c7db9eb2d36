//! Hook adapters for the LZ Cybernetics governor.
//!
//! A host invokes the governor once before and once after every tool call,
//! passing one JSON request and expecting one JSON response. [`Governor`]
//! drives the policy pipeline for both events and owns the fail-open
//! boundary: every internal fault becomes a permissive response.

#![warn(missing_docs, clippy::pedantic)]

pub mod error;
pub mod failure;
pub mod observer;
mod post;
mod pre;
pub mod protocol;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use governor_config::GovernorConfig;
use governor_memory::{FileSessionStore, SessionStateStore};
use governor_policy::{Controller, CorrectionStrategy, MESSAGE_PREFIX, NoPlanSource, PlanSource};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::warn;

pub use error::{HookError, HookResult};
pub use failure::{FailureInfo, detect_failure};
pub use observer::{CompositeDecisionObserver, DecisionObserver, TracingDecisionObserver};
pub use pre::apply_corrections;
pub use protocol::{
    PermissionDecision, PostToolUseRequest, PostToolUseResponse, PreToolUseRequest,
    PreToolUseResponse,
};

const PRE_FALLBACK: &str =
    r#"{"hookSpecificOutput":{"hookEventName":"PreToolUse","permissionDecision":"allow"}}"#;
const POST_FALLBACK: &str = "{}";

/// The governor: policy pipeline plus the session state it reads and writes.
#[derive(Clone)]
pub struct Governor {
    config: GovernorConfig,
    store: Arc<dyn SessionStateStore>,
    controller: Controller,
    plan_source: Arc<dyn PlanSource>,
    observer: Arc<dyn DecisionObserver>,
}

impl fmt::Debug for Governor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Governor")
            .field("config", &self.config)
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

impl Governor {
    /// Creates a governor over an explicit session store.
    #[must_use]
    pub fn new(config: GovernorConfig, store: Arc<dyn SessionStateStore>) -> Self {
        let controller = Controller::new(*config.limits());
        Self {
            config,
            store,
            controller,
            plan_source: Arc::new(NoPlanSource),
            observer: Arc::new(TracingDecisionObserver),
        }
    }

    /// Creates a governor persisting histories under the configured state
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Store`] when the store configuration is invalid.
    pub fn from_config(config: GovernorConfig) -> HookResult<Self> {
        let store = FileSessionStore::new(
            config.state_dir(),
            config.limits().max_history_size,
            config.io_timeout(),
        )?;
        Ok(Self::new(config, Arc::new(store)))
    }

    /// Replaces the session store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SessionStateStore>) -> Self {
        self.store = store;
        self
    }

    /// Supplies plan text to the contradiction detector.
    #[must_use]
    pub fn with_plan_source(mut self, plan_source: Arc<dyn PlanSource>) -> Self {
        self.plan_source = plan_source;
        self
    }

    /// Replaces the strategy deciding which invalid values are corrected.
    #[must_use]
    pub fn with_correction_strategy(mut self, strategy: Arc<dyn CorrectionStrategy>) -> Self {
        self.controller = self.controller.with_correction_strategy(strategy);
        self
    }

    /// Replaces the observer notified of pre-call decisions.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn DecisionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// Returns the session store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStateStore> {
        &self.store
    }

    /// Handles a raw pre-call request and returns the serialized response.
    ///
    /// Never fails: faults answer with an allow decision and a diagnostic
    /// message.
    pub async fn run_pre_hook(&self, raw: &[u8]) -> String {
        let response = match parse(raw, PreToolUseRequest::from_value) {
            Ok(request) => self.pre_tool_use(&request).await,
            Err(err) => pre_fault(&err),
        };
        encode(&response, PRE_FALLBACK)
    }

    /// Handles a raw post-call request and returns the serialized response.
    ///
    /// Never fails: faults answer with a diagnostic message only.
    pub async fn run_post_hook(&self, raw: &[u8]) -> String {
        let response = match parse(raw, PostToolUseRequest::from_value) {
            Ok(request) => self.post_tool_use(&request).await,
            Err(err) => post_fault(&err),
        };
        encode(&response, POST_FALLBACK)
    }
}

fn parse<T>(
    raw: &[u8],
    from_value: fn(serde_json::Value) -> governor_primitives::Result<T>,
) -> HookResult<T> {
    let payload = serde_json::from_slice(raw)?;
    Ok(from_value(payload)?)
}

fn encode<T: Serialize>(response: &T, fallback: &str) -> String {
    serde_json::to_string(response).unwrap_or_else(|err| {
        warn!(error = %err, "failed to encode hook response");
        fallback.to_owned()
    })
}

/// Fail-open response of the pre-call hook.
#[must_use]
pub fn pre_fault(err: &HookError) -> PreToolUseResponse {
    warn!(error = %err, "pre-call hook fault, allowing call");
    PreToolUseResponse::allow().with_system_message(Some(format!(
        "{MESSAGE_PREFIX} Hook error (allowing call): {err}"
    )))
}

/// Fail-open response of the post-call hook.
#[must_use]
pub fn post_fault(err: &HookError) -> PostToolUseResponse {
    warn!(error = %err, "post-call hook fault");
    PostToolUseResponse::message(format!("{MESSAGE_PREFIX} PostToolUse hook error: {err}"))
}

/// Serialized fail-open response of the pre-call hook.
#[must_use]
pub fn encode_pre_fault(err: &HookError) -> String {
    encode(&pre_fault(err), PRE_FALLBACK)
}

/// Serialized fail-open response of the post-call hook.
#[must_use]
pub fn encode_post_fault(err: &HookError) -> String {
    encode(&post_fault(err), POST_FALLBACK)
}

/// Reads a whole request from `reader` within `budget`.
///
/// # Errors
///
/// Returns [`HookError::Input`] on read failures and
/// [`HookError::InputTimeout`] when the budget elapses first.
pub async fn read_request<R>(reader: &mut R, budget: Duration) -> HookResult<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut raw = Vec::new();
    tokio::time::timeout(budget, reader.read_to_end(&mut raw))
        .await
        .map_err(|_| HookError::InputTimeout(budget))??;
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn fault_responses_fail_open() {
        let err = HookError::Input(std::io::Error::other("closed"));

        let pre: Value = serde_json::from_str(&encode_pre_fault(&err)).unwrap();
        assert_eq!(pre["hookSpecificOutput"]["permissionDecision"], "allow");
        assert_eq!(
            pre["systemMessage"],
            "[LZ-CYBERNETICS] Hook error (allowing call): failed to read hook input: closed"
        );

        let post: Value = serde_json::from_str(&encode_post_fault(&err)).unwrap();
        assert_eq!(
            post["systemMessage"],
            "[LZ-CYBERNETICS] PostToolUse hook error: failed to read hook input: closed"
        );
    }

    #[test]
    fn fallbacks_are_valid_json() {
        let pre: Value = serde_json::from_str(PRE_FALLBACK).unwrap();
        assert_eq!(pre["hookSpecificOutput"]["hookEventName"], "PreToolUse");
        assert_eq!(
            serde_json::from_str::<Value>(POST_FALLBACK).unwrap(),
            serde_json::json!({})
        );
    }

    #[tokio::test]
    async fn reads_whole_request() {
        let mut reader: &[u8] = br#"{"tool_name":"Read"}"#;
        let raw = read_request(&mut reader, Duration::from_secs(1)).await.unwrap();
        assert_eq!(raw, br#"{"tool_name":"Read"}"#);
    }

    #[tokio::test]
    async fn stalled_input_times_out() {
        let (mut reader, _writer) = tokio::io::duplex(64);
        let err = read_request(&mut reader, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::InputTimeout(_)));
    }
}
