/// Errors raised by the isolation integrations themselves.
///
/// Failures of the wrapped work are never translated into this type: a
/// `Result` returned by the work reaches the caller as-is, and a panic is
/// resumed on the caller.
#[derive(Debug, thiserror::Error)]
pub enum IsolationError {
    #[error("work was cancelled before it completed")]
    Cancelled,
    #[error("worker channel closed")]
    WorkerClosed,
    #[error("worker channel full")]
    WorkerFull,
    #[error("worker not running")]
    WorkerNotRunning,
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
