//! Logging setup for the governor.
//!
//! Hook responses own stdout, so every log line goes to stderr.

#![warn(missing_docs, clippy::pedantic)]

use tracing_subscriber::EnvFilter;

/// Returns the default filter directive for the given debug flag.
#[must_use]
pub fn default_directive(debug: bool) -> &'static str {
    if debug { "debug" } else { "warn" }
}

/// Builds the filter, preferring `RUST_LOG` over the default directive.
#[must_use]
pub fn env_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(debug)))
}

/// Error returned when the global subscriber cannot be installed.
pub type InitError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Installs the global stderr subscriber.
///
/// # Errors
///
/// Fails when a global subscriber was already installed.
pub fn try_init(debug: bool) -> Result<(), InitError> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(debug))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
}

/// Installs the global stderr subscriber, ignoring a previous installation.
///
/// Returns false when a subscriber was already installed.
pub fn init(debug: bool) -> bool {
    try_init(debug).is_ok()
}
