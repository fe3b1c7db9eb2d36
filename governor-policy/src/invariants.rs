//! Static allow-list, safety rule tables and retry limits.

use std::sync::LazyLock;

use governor_primitives::ToolCall;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name prefix reserved for cross-process (MCP) tools.
pub const MCP_PREFIX: &str = "mcp__";

/// Built-in tools the host is known to expose.
pub const BUILTIN_TOOLS: &[&str] = &[
    "Read",
    "Write",
    "Edit",
    "Glob",
    "Grep",
    "Bash",
    "Task",
    "TaskOutput",
    "TaskStop",
    "WebFetch",
    "WebSearch",
    "AskUserQuestion",
    "Skill",
    "LSP",
    "NotebookEdit",
    "ToolSearch",
    "ListMcpResourcesTool",
    "ReadMcpResourceTool",
    "EnterPlanMode",
    "ExitPlanMode",
    "TaskCreate",
    "TaskGet",
    "TaskUpdate",
    "TaskList",
];

/// Returns true for MCP-prefixed tools and built-in tools.
#[must_use]
pub fn is_allowed(tool: &str) -> bool {
    tool.starts_with(MCP_PREFIX) || BUILTIN_TOOLS.contains(&tool)
}

/// Retry, oscillation and size limits applied by detectors and the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Trailing failed calls of one tool that count as a loop.
    pub max_consecutive_failures: usize,
    /// Identical calls inside the window that count as a loop.
    pub max_retries: usize,
    /// Length of the trailing detection window in milliseconds.
    pub oscillation_window_ms: i64,
    /// Entries kept per session history.
    pub max_history_size: usize,
    /// Longest `old_string` an edit may replace, in characters.
    pub max_old_string_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 3,
            max_retries: 5,
            oscillation_window_ms: 30_000,
            max_history_size: 100,
            max_old_string_len: 10_000,
        }
    }
}

/// A labeled regular expression in a safety table.
#[derive(Debug)]
pub struct SafetyRule {
    label: &'static str,
    pattern: Regex,
}

impl SafetyRule {
    fn new(label: &'static str, pattern: &str) -> Self {
        Self {
            label,
            pattern: Regex::new(pattern).expect("safety rule pattern compiles"),
        }
    }

    /// Returns the human-readable rule label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Returns true when the rule matches `text`.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

static SENSITIVE_PATHS: LazyLock<Vec<SafetyRule>> = LazyLock::new(|| {
    vec![
        SafetyRule::new("env file", r"(?i)\.env$"),
        SafetyRule::new("env variant", r"(?i)\.env\."),
        SafetyRule::new("credentials", r"(?i)credentials"),
        SafetyRule::new("secrets", r"(?i)secrets?\."),
        SafetyRule::new("pem certificate", r"(?i)\.pem$"),
        SafetyRule::new("private key", r"(?i)\.key$"),
        SafetyRule::new("password", r"(?i)password"),
    ]
});

static DANGEROUS_COMMANDS: LazyLock<Vec<SafetyRule>> = LazyLock::new(|| {
    vec![
        SafetyRule::new("recursive delete of root or home", r"(?i)rm\s+-rf\s+[/~]"),
        SafetyRule::new("block device write", r"(?i)>\s*/dev/sd"),
        SafetyRule::new("filesystem format", r"(?i)mkfs\."),
        SafetyRule::new("raw disk copy", r"(?i)dd\s+if="),
        SafetyRule::new("fork bomb", r":\(\)\s*\{"),
        SafetyRule::new(
            "recursive Remove-Item on drive",
            r"(?i)Remove-Item\s+.*-Recurse.*[A-Z]:\\",
        ),
        SafetyRule::new(
            "Remove-Item on drive with recurse",
            r"(?i)Remove-Item\s+.*[A-Z]:\\.*-Recurse",
        ),
        SafetyRule::new("rd /s on drive", r"(?i)rd\s+/s\s+[A-Z]:\\"),
        SafetyRule::new("rmdir /s on drive", r"(?i)rmdir\s+/s\s+[A-Z]:\\"),
        SafetyRule::new("Format-Volume", r"(?i)Format-Volume"),
        SafetyRule::new("Clear-Disk", r"(?i)Clear-Disk"),
        SafetyRule::new("Initialize-Disk", r"(?i)Initialize-Disk"),
    ]
});

/// Ordered rules flagging sensitive file paths for writes.
#[must_use]
pub fn sensitive_path_rules() -> &'static [SafetyRule] {
    &SENSITIVE_PATHS
}

/// Ordered rules flagging destructive shell commands.
#[must_use]
pub fn dangerous_command_rules() -> &'static [SafetyRule] {
    &DANGEROUS_COMMANDS
}

/// Returns the first rule in `rules` matching `text`.
#[must_use]
pub fn matching_rule<'a>(rules: &'a [SafetyRule], text: &str) -> Option<&'a SafetyRule> {
    rules.iter().find(|rule| rule.matches(text))
}

/// Runs the safety profile of the called tool against its input.
///
/// Only `Write`, `Bash` and `Edit` have profiles; every other tool yields no
/// violations. Each profile reports at most one violation.
#[must_use]
pub fn check_safety(call: &ToolCall, limits: &Limits) -> Vec<String> {
    let mut violations = Vec::new();
    let text = |field: &str| call.str_field(field).filter(|value| !value.is_empty());

    match call.tool() {
        "Write" => {
            if let Some(path) = text("file_path")
                && let Some(rule) = matching_rule(sensitive_path_rules(), path)
            {
                debug!(rule = rule.label(), path, "sensitive path rule matched");
                violations.push(format!("Sensitive file pattern detected: {path}"));
            }
        }
        "Bash" => {
            if let Some(command) = text("command")
                && let Some(rule) = matching_rule(dangerous_command_rules(), command)
            {
                debug!(rule = rule.label(), "dangerous command rule matched");
                violations.push("Dangerous command pattern detected".to_owned());
            }
        }
        "Edit" => {
            if let Some(old) = text("old_string")
                && old.chars().count() > limits.max_old_string_len
            {
                violations.push(format!(
                    "old_string exceeds maximum length ({})",
                    limits.max_old_string_len
                ));
            }
        }
        _ => {}
    }

    violations
}
