//! Tool call descriptors shared between detectors and the history store.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single tool invocation as seen by the governor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    tool: String,
    #[serde(default)]
    input: Value,
}

impl ToolCall {
    /// Creates a tool call from a tool name and its raw input.
    #[must_use]
    pub fn new(tool: impl Into<String>, input: Value) -> Self {
        Self {
            tool: tool.into(),
            input,
        }
    }

    /// Returns the tool name.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Returns the raw tool input.
    #[must_use]
    pub fn input(&self) -> &Value {
        &self.input
    }

    /// Returns a string-valued input field.
    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.input.get(name).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_accessors() {
        let call = ToolCall::new("Read", json!({ "file_path": "/a.txt", "limit": 10 }));
        assert_eq!(call.tool(), "Read");
        assert_eq!(call.str_field("file_path"), Some("/a.txt"));
        assert_eq!(call.str_field("limit"), None);

        let call = ToolCall::new("Read", json!([1, 2]));
        assert_eq!(call.str_field("file_path"), None);
    }
}
