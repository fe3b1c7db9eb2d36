//! Hook wire protocol: one JSON request in, one JSON response out.

use governor_policy::ErrorVector;
use governor_primitives::{Error, SessionId, ToolCall};
use serde::Serialize;
use serde_json::{Map, Value};

/// Event name of the pre-call hook.
pub const PRE_TOOL_USE: &str = "PreToolUse";
/// Default event name of the post-call hook.
pub const POST_TOOL_USE: &str = "PostToolUse";
/// Post-call event the host sends when the tool itself failed.
pub const POST_TOOL_USE_FAILURE: &str = "PostToolUseFailure";

fn object(payload: Value) -> Result<Map<String, Value>, Error> {
    match payload {
        Value::Object(fields) => Ok(fields),
        other => Err(Error::malformed(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn tool_name(fields: &Map<String, Value>) -> Option<String> {
    fields
        .get("tool_name")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// Absent and `null` inputs are treated as an empty object.
fn tool_input(fields: &Map<String, Value>) -> Value {
    match fields.get("tool_input") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(value) => value.clone(),
    }
}

fn session(fields: &Map<String, Value>) -> Option<SessionId> {
    fields.get("session_id").and_then(SessionId::from_json)
}

/// Request sent to the pre-call hook.
#[derive(Debug, Clone, PartialEq)]
pub struct PreToolUseRequest {
    tool_name: Option<String>,
    tool_input: Value,
    session: Option<SessionId>,
}

impl PreToolUseRequest {
    /// Parses a request from a decoded payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPayload`] when the payload is not an object.
    pub fn from_value(payload: Value) -> Result<Self, Error> {
        let fields = object(payload)?;
        Ok(Self {
            tool_name: tool_name(&fields),
            tool_input: tool_input(&fields),
            session: session(&fields),
        })
    }

    /// Returns the tool name when it was supplied as a string.
    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        self.tool_name.as_deref()
    }

    /// Returns the tool input.
    #[must_use]
    pub fn tool_input(&self) -> &Value {
        &self.tool_input
    }

    /// Returns the session, if one was supplied.
    #[must_use]
    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    /// Returns the call as seen by the detectors.
    #[must_use]
    pub fn call(&self) -> ToolCall {
        ToolCall::new(self.tool_name().unwrap_or_default(), self.tool_input.clone())
    }
}

/// Request sent to the post-call hook.
#[derive(Debug, Clone, PartialEq)]
pub struct PostToolUseRequest {
    tool_name: Option<String>,
    tool_input: Value,
    tool_result: Option<Value>,
    session: Option<SessionId>,
    event: String,
    payload: Map<String, Value>,
}

impl PostToolUseRequest {
    /// Parses a request from a decoded payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPayload`] when the payload is not an object.
    pub fn from_value(payload: Value) -> Result<Self, Error> {
        let fields = object(payload)?;
        let event = fields
            .get("hook_event_name")
            .and_then(Value::as_str)
            .filter(|event| !event.is_empty())
            .unwrap_or(POST_TOOL_USE)
            .to_owned();
        Ok(Self {
            tool_name: tool_name(&fields),
            tool_input: tool_input(&fields),
            tool_result: fields
                .get("tool_result")
                .filter(|result| !result.is_null())
                .cloned(),
            session: session(&fields),
            event,
            payload: fields,
        })
    }

    /// Returns the tool name when it was supplied as a string.
    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        self.tool_name.as_deref()
    }

    /// Returns the tool input.
    #[must_use]
    pub fn tool_input(&self) -> &Value {
        &self.tool_input
    }

    /// Returns the tool result, if one was reported.
    #[must_use]
    pub fn tool_result(&self) -> Option<&Value> {
        self.tool_result.as_ref()
    }

    /// Returns the session, if one was supplied.
    #[must_use]
    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    /// Returns the hook event name.
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Returns true for the host's dedicated failure event.
    #[must_use]
    pub fn is_failure_event(&self) -> bool {
        self.event == POST_TOOL_USE_FAILURE
    }

    /// Returns a top-level payload field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// Returns the call as seen by the detectors.
    #[must_use]
    pub fn call(&self) -> ToolCall {
        ToolCall::new(self.tool_name().unwrap_or_default(), self.tool_input.clone())
    }
}

/// Permission the pre-call hook grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionDecision {
    /// The host runs the call.
    Allow,
    /// The host refuses the call.
    Deny,
}

/// Event-specific part of the pre-call response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    hook_event_name: &'static str,
    permission_decision: PermissionDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_input: Option<Value>,
}

/// Response of the pre-call hook.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreToolUseResponse {
    hook_specific_output: HookSpecificOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_vector: Option<ErrorVector>,
    #[serde(rename = "_debug", skip_serializing_if = "Option::is_none")]
    debug: Option<Value>,
}

impl PreToolUseResponse {
    fn new(permission_decision: PermissionDecision) -> Self {
        Self {
            hook_specific_output: HookSpecificOutput {
                hook_event_name: PRE_TOOL_USE,
                permission_decision,
                updated_input: None,
            },
            system_message: None,
            error_vector: None,
            debug: None,
        }
    }

    /// Lets the call run.
    #[must_use]
    pub fn allow() -> Self {
        Self::new(PermissionDecision::Allow)
    }

    /// Refuses the call, reporting the findings that led to it.
    #[must_use]
    pub fn deny(error_vector: ErrorVector) -> Self {
        Self {
            error_vector: Some(error_vector),
            ..Self::new(PermissionDecision::Deny)
        }
    }

    /// Lets the call run with a replaced input.
    #[must_use]
    pub fn with_updated_input(mut self, input: Value) -> Self {
        self.hook_specific_output.updated_input = Some(input);
        self
    }

    /// Attaches a message for the agent.
    #[must_use]
    pub fn with_system_message(mut self, message: Option<String>) -> Self {
        self.system_message = message;
        self
    }

    /// Attaches diagnostic fields.
    #[must_use]
    pub fn with_debug(mut self, debug: Value) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Returns the granted permission.
    #[must_use]
    pub fn permission(&self) -> PermissionDecision {
        self.hook_specific_output.permission_decision
    }

    /// Returns the replaced input, if any.
    #[must_use]
    pub fn updated_input(&self) -> Option<&Value> {
        self.hook_specific_output.updated_input.as_ref()
    }

    /// Returns the message for the agent, if any.
    #[must_use]
    pub fn system_message(&self) -> Option<&str> {
        self.system_message.as_deref()
    }

    /// Returns the reported findings for refused calls.
    #[must_use]
    pub fn error_vector(&self) -> Option<&ErrorVector> {
        self.error_vector.as_ref()
    }
}

/// Response of the post-call hook.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostToolUseResponse {
    #[serde(rename = "systemMessage", skip_serializing_if = "Option::is_none")]
    system_message: Option<String>,
    #[serde(rename = "_debug", skip_serializing_if = "Option::is_none")]
    debug: Option<Value>,
}

impl PostToolUseResponse {
    /// Response carrying only a message for the agent.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            system_message: Some(message.into()),
            debug: None,
        }
    }

    /// Attaches a message for the agent.
    #[must_use]
    pub fn with_system_message(mut self, message: Option<String>) -> Self {
        self.system_message = message;
        self
    }

    /// Attaches diagnostic fields.
    #[must_use]
    pub fn with_debug(mut self, debug: Value) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Returns the message for the agent, if any.
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
    fn pre_request_defaults() {
        let request = PreToolUseRequest::from_value(json!({
            "tool_name": "Read",
            "tool_input": null,
            "session_id": "abc/1",
        }))
        .unwrap();
        assert_eq!(request.tool_name(), Some("Read"));
        assert_eq!(request.tool_input(), &json!({}));
        assert_eq!(request.session().map(SessionId::as_str), Some("abc_1"));

        let request = PreToolUseRequest::from_value(json!({ "tool_name": 7 })).unwrap();
        assert_eq!(request.tool_name(), None);
        assert_eq!(request.call().tool(), "");
        assert!(request.session().is_none());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = PreToolUseRequest::from_value(json!([1, 2])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "malformed hook payload: expected a JSON object, got array"
        );
        assert!(PostToolUseRequest::from_value(Value::Null).is_err());
    }

    #[test]
    fn post_request_event_and_result() {
        let request = PostToolUseRequest::from_value(json!({
            "tool_name": "Bash",
            "tool_result": null,
            "error": "boom",
        }))
        .unwrap();
        assert_eq!(request.event(), POST_TOOL_USE);
        assert!(!request.is_failure_event());
        assert!(request.tool_result().is_none());
        assert_eq!(request.field("error"), Some(&json!("boom")));

        let request = PostToolUseRequest::from_value(json!({
            "hook_event_name": POST_TOOL_USE_FAILURE,
        }))
        .unwrap();
        assert!(request.is_failure_event());
    }

    #[test]
    fn responses_serialize_with_wire_names() {
        let allow = serde_json::to_value(PreToolUseResponse::allow()).unwrap();
        assert_eq!(
            allow,
            json!({ "hookSpecificOutput": { "hookEventName": "PreToolUse", "permissionDecision": "allow" } })
        );

        let deny = PreToolUseResponse::deny(ErrorVector::new())
            .with_system_message(Some("no".into()))
            .with_debug(json!({ "hook": "pre" }));
        let deny = serde_json::to_value(deny).unwrap();
        assert_eq!(deny["hookSpecificOutput"]["permissionDecision"], "deny");
        assert_eq!(deny["systemMessage"], "no");
        assert_eq!(deny["errorVector"]["missing_fields"], json!([]));
        assert_eq!(deny["_debug"]["hook"], "pre");

        let corrected = PreToolUseResponse::allow().with_updated_input(json!({ "limit": 1 }));
        let corrected = serde_json::to_value(corrected).unwrap();
        assert_eq!(corrected["hookSpecificOutput"]["updatedInput"]["limit"], 1);

        assert_eq!(
            serde_json::to_string(&PostToolUseResponse::default()).unwrap(),
            "{}"
        );
        assert_eq!(
            serde_json::to_value(PostToolUseResponse::message("hi")).unwrap(),
            json!({ "systemMessage": "hi" })
        );
    }
}
