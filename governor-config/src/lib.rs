//! Startup configuration for the governor.
//!
//! Configuration is resolved once per process from environment variables
//! and passed explicitly to the hook pipelines. Invalid overrides are logged
//! and replaced by their defaults so a bad environment never blocks a hook.

#![warn(missing_docs, clippy::pedantic)]

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use governor_policy::Limits;
use serde::Serialize;
use tracing::warn;

/// Enables debug output when set to any non-empty value.
pub const ENV_DEBUG: &str = "LZ_CYBERNETICS_DEBUG";
/// Overrides the directory holding histories and the debug sentinel.
pub const ENV_STATE_DIR: &str = "LZ_CYBERNETICS_STATE_DIR";
/// Overrides the per-session history cap.
pub const ENV_MAX_HISTORY: &str = "LZ_CYBERNETICS_MAX_HISTORY";
/// Overrides the detection window in milliseconds.
pub const ENV_WINDOW_MS: &str = "LZ_CYBERNETICS_WINDOW_MS";

/// Name of the state directory under the system temp dir.
pub const STATE_DIR_NAME: &str = "lz-cybernetics.governor";
/// File whose presence in the state directory enables debug output.
pub const DEBUG_SENTINEL: &str = "debug-enabled";

const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_INPUT_TIMEOUT: Duration = Duration::from_secs(10);

/// Immutable governor configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GovernorConfig {
    debug: bool,
    state_dir: PathBuf,
    limits: Limits,
    io_timeout: Duration,
    input_timeout: Duration,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            debug: false,
            state_dir: default_state_dir(),
            limits: Limits::default(),
            io_timeout: DEFAULT_IO_TIMEOUT,
            input_timeout: DEFAULT_INPUT_TIMEOUT,
        }
    }
}

impl GovernorConfig {
    /// Resolves the configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves the configuration through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_STATE_DIR).filter(|dir| !dir.trim().is_empty()) {
            config.state_dir = PathBuf::from(dir);
        }

        if let Some(max) = parse_override::<usize>(&lookup, ENV_MAX_HISTORY).filter(|max| *max > 0)
        {
            config.limits.max_history_size = max;
        }

        if let Some(window) = parse_override::<i64>(&lookup, ENV_WINDOW_MS).filter(|ms| *ms > 0) {
            config.limits.oscillation_window_ms = window;
        }

        let env_debug = lookup(ENV_DEBUG).is_some_and(|value| !value.is_empty());
        config.debug = env_debug || config.debug_sentinel().exists();
        config
    }

    /// Forces debug output on or off.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Replaces the state directory.
    #[must_use]
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    /// Replaces the detection limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Replaces the budget for each persistence operation.
    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Returns true when diagnostic fields are attached to hook responses.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Returns the directory holding session histories.
    #[must_use]
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Returns the path of the debug sentinel file.
    #[must_use]
    pub fn debug_sentinel(&self) -> PathBuf {
        self.state_dir.join(DEBUG_SENTINEL)
    }

    /// Returns the detection limits.
    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Returns the budget for each persistence operation.
    #[must_use]
    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    /// Returns the budget for reading the hook request.
    #[must_use]
    pub fn input_timeout(&self) -> Duration {
        self.input_timeout
    }
}

fn default_state_dir() -> PathBuf {
    std::env::temp_dir().join(STATE_DIR_NAME)
}

fn parse_override<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(variable = key, value = %raw, error = %err, "ignoring invalid override");
            None
        }
    }
}
