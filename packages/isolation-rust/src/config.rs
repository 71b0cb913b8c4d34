//! Configuration types for scope propagation and the scoped worker.

use std::time::Duration;

/// Controls what the propagating strategy does around each invocation.
#[derive(Debug, Clone)]
pub struct PropagationConfig {
    /// Enter a `request_scope` tracing span carrying `gtid` and `user_id`
    /// while a unit of work runs with a captured attribute.
    pub record_span: bool,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self { record_span: true }
    }
}

/// Settings for a [`ScopedWorker`](crate::worker::ScopedWorker).
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Bounded mpsc channel capacity for submitted tasks.
    pub channel_capacity: usize,
    /// Interval between `on_tick` callbacks.
    pub tick_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            tick_interval: Duration::from_secs(60),
        }
    }
}

/// Tracing subscriber settings used by [`init_tracing`](crate::telemetry::init_tracing).
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub default_directive: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_directive: "info".to_string(),
            json: false,
        }
    }
}
