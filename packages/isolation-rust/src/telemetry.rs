//! Tracing subscriber bootstrap.
//!
//! Work executed through a propagating strategy runs inside a
//! `request_scope` span, so any `fmt` layer installed here prints the
//! request's `gtid` and `user_id` next to log lines emitted on pool threads.

use anyhow::Context as _;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::IsolationError;

/// Builds the filter from `RUST_LOG`, falling back to the configured directive.
///
/// # Errors
///
/// Returns an error if the fallback directive does not parse.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, IsolationError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let filter = EnvFilter::try_new(&config.default_directive)
        .with_context(|| format!("invalid log directive {:?}", config.default_directive))?;
    Ok(filter)
}

/// Installs the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the filter is invalid or a global subscriber is
/// already installed. Never panics.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), IsolationError> {
    let filter = env_filter(config)?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        registry
            .with(fmt::layer().json().with_thread_names(true).with_current_span(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_thread_names(true)).try_init()
    };

    result.context("global tracing subscriber already installed")?;
    Ok(())
}
