//! Submission of wrapped work to tokio's thread pools.
//!
//! Both helpers wrap eagerly, when called, so the submitting thread's scope
//! is captured before the work is queued.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::{JoinError, JoinHandle};

use crate::error::IsolationError;
use crate::strategy::ConcurrencyStrategy;

/// Runs `work` on tokio's blocking pool through `strategy`.
///
/// Must be called from within a tokio runtime.
pub fn spawn_blocking<St, F, T>(strategy: &St, work: F) -> ScopedJoinHandle<T>
where
    St: ConcurrencyStrategy,
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    ScopedJoinHandle {
        inner: tokio::task::spawn_blocking(strategy.wrap_callable(work)),
    }
}

/// Spawns `fut` as a tokio task through `strategy`.
///
/// Must be called from within a tokio runtime.
pub fn spawn<St, Fut>(strategy: &St, fut: Fut) -> ScopedJoinHandle<Fut::Output>
where
    St: ConcurrencyStrategy,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    ScopedJoinHandle {
        inner: tokio::spawn(strategy.wrap_future(fut)),
    }
}

/// Handle to work submitted through [`spawn_blocking`] or [`spawn`].
///
/// Resolves to the work's own output. A panic inside the work is resumed on
/// the task awaiting the handle; only cancellation surfaces as an
/// [`IsolationError`].
#[derive(Debug)]
#[must_use = "dropping the handle detaches the work"]
pub struct ScopedJoinHandle<T> {
    inner: JoinHandle<T>,
}

impl<T> ScopedJoinHandle<T> {
    /// Requests cancellation. Work that has not started never installs its scope.
    pub fn abort(&self) {
        self.inner.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl<T> Future for ScopedJoinHandle<T> {
    type Output = Result<T, IsolationError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx).map(|result| result.map_err(join_failure))
    }
}

fn join_failure(err: JoinError) -> IsolationError {
    match err.try_into_panic() {
        Ok(payload) => std::panic::resume_unwind(payload),
        Err(_) => IsolationError::Cancelled,
    }
}
