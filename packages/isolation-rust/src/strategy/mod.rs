//! Extension point through which an isolation framework decorates units of
//! work before handing them to its worker pool.
//!
//! A strategy transforms one unit of work into an equivalent one. The
//! framework decides where and when the result runs; implementations only add
//! side effects around the invocation and must preserve the output (including
//! `Result` errors and panics) unchanged.

mod propagating;

use std::future::Future;

pub use propagating::ScopePropagatingStrategy;
pub(crate) use propagating::scope_span;

/// Decorates units of work crossing into a pool-managed thread.
///
/// Strategies compose: an implementation that wraps work typically passes its
/// own wrapper on to a delegate strategy, the way
/// [`ScopePropagatingStrategy`] does.
pub trait ConcurrencyStrategy: Send + Sync {
    /// Wraps a synchronous unit of work.
    ///
    /// Called on the submitting thread; anything the wrapper needs from that
    /// thread must be read here, not when the wrapper runs.
    fn wrap_callable<F, T>(&self, work: F) -> impl FnOnce() -> T + Send + 'static
    where
        F: FnOnce() -> T + Send + 'static,
        T: 'static;

    /// Wraps a unit of work that produces no value.
    fn wrap_runnable<F>(&self, work: F) -> impl FnOnce() + Send + 'static
    where
        F: FnOnce() + Send + 'static,
    {
        self.wrap_callable(work)
    }

    /// Wraps a future. The default leaves it untouched.
    fn wrap_future<Fut>(&self, fut: Fut) -> impl Future<Output = Fut::Output> + Send + 'static
    where
        Fut: Future + Send + 'static,
    {
        fut
    }
}

/// Strategy that hands work back unchanged. Terminates a delegate chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughStrategy;

impl ConcurrencyStrategy for PassThroughStrategy {
    fn wrap_callable<F, T>(&self, work: F) -> impl FnOnce() -> T + Send + 'static
    where
        F: FnOnce() -> T + Send + 'static,
        T: 'static,
    {
        work
    }
}
