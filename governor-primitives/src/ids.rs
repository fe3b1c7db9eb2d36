//! Session identifier types.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Error;

/// Replacement used for characters outside `[A-Za-z0-9-_]`.
const REPLACEMENT: char = '_';

/// Sanitized identifier of an agent session.
///
/// The identifier doubles as the persistence key for the session history, so
/// every character outside `[A-Za-z0-9-_]` is replaced with `_` on
/// construction.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session identifier from a raw host-supplied value.
    ///
    /// Returns `None` when the raw value is empty, which callers treat as
    /// "no session": history is neither read nor written.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let raw = raw.as_ref();
        if raw.is_empty() {
            return None;
        }
        Some(Self(sanitize(raw)))
    }

    /// Extracts a session identifier from the `session_id` field of a hook
    /// payload.
    ///
    /// Strings are used directly; numbers and `true` are stringified. `null`,
    /// `false`, empty strings and structured values yield `None`.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(raw) => Self::new(raw),
            Value::Number(number) => Self::new(number.to_string()),
            Value::Bool(true) => Self::new("true"),
            _ => None,
        }
    }

    /// Returns the sanitized identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or_else(|| Error::InvalidSessionId {
            raw: s.to_owned(),
            reason: "session id cannot be empty".into(),
        })
    }
}

impl From<SessionId> for String {
    fn from(value: SessionId) -> Self {
        value.0
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                REPLACEMENT
            }
        })
        .collect()
}
