//! Tracing subscriber setup.
//!
//! The filter comes from `RELAYQ_LOG`, then `RUST_LOG`, then the caller's
//! default directive.

use relayq_domain::{QueueError, Result};
use tracing_subscriber::EnvFilter;

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "RELAYQ_LOG";

/// Install a human-readable global subscriber.
///
/// # Errors
/// `QueueError::Config` for an invalid filter, `QueueError::InvalidState` if a
/// global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter)?)
        .with_target(true)
        .try_init()
        .map_err(|e| QueueError::InvalidState(format!("tracing already initialised: {e}")))
}

/// Install a JSON-lines global subscriber for log shipping.
///
/// # Errors
/// Same as [`init_tracing`].
pub fn init_json_tracing(default_filter: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter(default_filter)?)
        .with_current_span(true)
        .try_init()
        .map_err(|e| QueueError::InvalidState(format!("tracing already initialised: {e}")))
}

/// Resolve the effective filter directive.
pub fn env_filter(default_filter: &str) -> Result<EnvFilter> {
    let directive = std::env::var(LOG_ENV)
        .or_else(|_| std::env::var(EnvFilter::DEFAULT_ENV))
        .unwrap_or_else(|_| default_filter.to_string());

    EnvFilter::try_new(&directive)
        .map_err(|e| QueueError::Config(format!("invalid log filter '{directive}': {e}")))
}
