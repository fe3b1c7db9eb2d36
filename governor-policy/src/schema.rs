//! Per-tool field contracts and input validation.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::contracts::InvalidValue;
use crate::invariants::MCP_PREFIX;

/// Primitive type a schema expects for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// JSON string.
    String,
    /// JSON number.
    Number,
    /// JSON boolean.
    Boolean,
    /// JSON array.
    Array,
}

impl FieldType {
    /// Returns the lowercase type name used in validation reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::String, Value::String(_))
                | (Self::Number, Value::Number(_))
                | (Self::Boolean, Value::Bool(_))
                | (Self::Array, Value::Array(_))
        )
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type name reported for a value that failed a type check.
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Default value declared for an optional field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    /// JSON boolean.
    Bool(bool),
    /// JSON integer.
    Integer(i64),
    /// JSON string.
    Text(&'static str),
}

impl From<FieldDefault> for Value {
    fn from(default: FieldDefault) -> Self {
        match default {
            FieldDefault::Bool(flag) => Value::Bool(flag),
            FieldDefault::Integer(number) => Value::from(number),
            FieldDefault::Text(text) => Value::from(text),
        }
    }
}

/// Field contract for one tool.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ToolSchema {
    required: &'static [&'static str],
    types: &'static [(&'static str, FieldType)],
    defaults: &'static [(&'static str, FieldDefault)],
    forbidden: &'static [&'static str],
}

impl ToolSchema {
    /// Schema that accepts any input.
    #[must_use]
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Fields that must be present and non-null.
    #[must_use]
    pub fn required(&self) -> &[&'static str] {
        self.required
    }

    /// Declared field types, in declaration order.
    #[must_use]
    pub fn types(&self) -> &[(&'static str, FieldType)] {
        self.types
    }

    /// Informational defaults; never applied by validation.
    #[must_use]
    pub fn defaults(&self) -> &[(&'static str, FieldDefault)] {
        self.defaults
    }

    /// Returns the declared default of `field` as JSON.
    #[must_use]
    pub fn default_value(&self, field: &str) -> Option<Value> {
        self.defaults
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, default)| Value::from(*default))
    }

    /// Fields that must never be present.
    #[must_use]
    pub fn forbidden(&self) -> &[&'static str] {
        self.forbidden
    }

    /// Returns true when the schema performs no checks.
    #[must_use]
    pub fn is_permissive(&self) -> bool {
        self.required.is_empty() && self.types.is_empty() && self.forbidden.is_empty()
    }

    /// Validates a tool input object against the schema.
    #[must_use]
    pub fn validate(&self, input: &Map<String, Value>) -> SchemaReport {
        let present = |field: &str| input.get(field).filter(|value| !value.is_null());
        let mut report = SchemaReport::default();

        for field in self.required {
            if present(*field).is_none() {
                report.missing_fields.push((*field).to_owned());
            }
        }

        for (field, expected) in self.types {
            if let Some(value) = present(*field)
                && !expected.accepts(value)
            {
                report
                    .invalid_values
                    .push(InvalidValue::type_mismatch(*field, *expected, type_name(value)));
            }
        }

        for field in self.forbidden {
            if input.contains_key(*field) {
                report.invalid_values.push(InvalidValue::forbidden(*field));
            }
        }

        report
    }
}

/// Findings of a schema validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaReport {
    /// Required fields that were absent or null.
    pub missing_fields: Vec<String>,
    /// Type mismatches and forbidden fields.
    pub invalid_values: Vec<InvalidValue>,
}

impl SchemaReport {
    /// Returns true when nothing was reported.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing_fields.is_empty() && self.invalid_values.is_empty()
    }
}

struct Contract {
    tool: &'static str,
    required: &'static [&'static str],
    types: &'static [(&'static str, FieldType)],
    defaults: &'static [(&'static str, FieldDefault)],
    forbidden: &'static [&'static str],
}

const CONTRACTS: &[Contract] = {
    use FieldType::{Array, Boolean, Number, String as Str};
    &[
        Contract {
            tool: "Read",
            required: &["file_path"],
            types: &[("file_path", Str), ("offset", Number), ("limit", Number)],
            defaults: &[],
            forbidden: &[],
        },
        Contract {
            tool: "Write",
            required: &["file_path", "content"],
            types: &[("file_path", Str), ("content", Str)],
            defaults: &[],
            forbidden: &[],
        },
        Contract {
            tool: "Edit",
            required: &["file_path", "old_string", "new_string"],
            types: &[
                ("file_path", Str),
                ("old_string", Str),
                ("new_string", Str),
                ("replace_all", Boolean),
            ],
            defaults: &[("replace_all", FieldDefault::Bool(false))],
            forbidden: &[],
        },
        Contract {
            tool: "Bash",
            required: &["command"],
            types: &[
                ("command", Str),
                ("timeout", Number),
                ("run_in_background", Boolean),
            ],
            defaults: &[],
            forbidden: &[],
        },
        Contract {
            tool: "Glob",
            required: &["pattern"],
            types: &[("pattern", Str), ("path", Str)],
            defaults: &[],
            forbidden: &[],
        },
        Contract {
            tool: "Grep",
            required: &["pattern"],
            types: &[
                ("pattern", Str),
                ("path", Str),
                ("glob", Str),
                ("type", Str),
                ("output_mode", Str),
            ],
            defaults: &[],
            forbidden: &[],
        },
        Contract {
            tool: "Task",
            required: &["description", "prompt", "subagent_type"],
            types: &[
                ("description", Str),
                ("prompt", Str),
                ("subagent_type", Str),
                ("model", Str),
                ("run_in_background", Boolean),
            ],
            defaults: &[],
            forbidden: &[],
        },
        Contract {
            tool: "WebFetch",
            required: &["url", "prompt"],
            types: &[("url", Str), ("prompt", Str)],
            defaults: &[],
            forbidden: &[],
        },
        Contract {
            tool: "WebSearch",
            required: &["query"],
            types: &[
                ("query", Str),
                ("allowed_domains", Array),
                ("blocked_domains", Array),
            ],
            defaults: &[],
            forbidden: &[],
        },
        Contract {
            tool: "AskUserQuestion",
            required: &["questions"],
            types: &[("questions", Array)],
            defaults: &[],
            forbidden: &[],
        },
        Contract {
            tool: "LSP",
            required: &["operation", "filePath", "line", "character"],
            types: &[
                ("operation", Str),
                ("filePath", Str),
                ("line", Number),
                ("character", Number),
            ],
            defaults: &[],
            forbidden: &[],
        },
    ]
};

/// Returns the contract for `tool`.
///
/// MCP tools and unknown tools get a permissive schema; unknown names are
/// flagged by the hallucination detector instead.
#[must_use]
pub fn schema_for(tool: &str) -> ToolSchema {
    if tool.starts_with(MCP_PREFIX) {
        return ToolSchema::permissive();
    }
    let Some(contract) = CONTRACTS.iter().find(|contract| contract.tool == tool) else {
        return ToolSchema::permissive();
    };

    ToolSchema {
        required: contract.required,
        types: contract.types,
        defaults: contract.defaults,
        forbidden: contract.forbidden,
    }
}

/// Names of the tools with a non-permissive contract.
pub fn known_tools() -> impl Iterator<Item = &'static str> {
    CONTRACTS.iter().map(|contract| contract.tool)
}

/// Validates `input` against the contract for `tool`.
///
/// Non-object inputs are checked as if they were empty; their shape is
/// reported separately by the malformed-input detector.
#[must_use]
pub fn validate(tool: &str, input: &Value) -> SchemaReport {
    let empty = Map::new();
    let fields = input.as_object().unwrap_or(&empty);
    schema_for(tool).validate(fields)
}
