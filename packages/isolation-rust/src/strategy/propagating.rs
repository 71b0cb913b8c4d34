use std::future::Future;

use scopehop_core::{ScopeSnapshot, ScopeStore, ThreadLocalStore};
use tracing::Span;

use super::{ConcurrencyStrategy, PassThroughStrategy};
use crate::config::PropagationConfig;
use crate::future::ScopedFuture;

/// Carries the submitting thread's request-scope attribute into the thread
/// that eventually runs the work.
///
/// `wrap_callable` captures the attribute immediately, on the submitting
/// thread. When the wrapper runs it records whatever the executing thread
/// already holds, installs the captured attribute (only if one was captured),
/// runs the work and then puts the recorded value back, also when the work
/// panics. The wrapper is then handed to the delegate strategy.
///
/// Each wrapper restores only its own prior state, so wrapping an already
/// wrapped unit is safe: the innermost capture wins while it runs and every
/// layer unwinds to what it found.
#[derive(Debug, Clone, Default)]
pub struct ScopePropagatingStrategy<D = PassThroughStrategy, S = ThreadLocalStore> {
    delegate: D,
    store: S,
    config: PropagationConfig,
}

impl ScopePropagatingStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D, S> ScopePropagatingStrategy<D, S>
where
    D: ConcurrencyStrategy,
    S: ScopeStore,
{
    #[must_use]
    pub fn with_config(mut self, config: PropagationConfig) -> Self {
        self.config = config;
        self
    }

    /// Chains `delegate` after this strategy: it receives the propagating
    /// wrapper rather than the original work.
    #[must_use]
    pub fn with_delegate<D2: ConcurrencyStrategy>(self, delegate: D2) -> ScopePropagatingStrategy<D2, S> {
        ScopePropagatingStrategy {
            delegate,
            store: self.store,
            config: self.config,
        }
    }

    /// Reads and writes attributes through `store` instead of the thread-local slot.
    #[must_use]
    pub fn with_store<S2: ScopeStore>(self, store: S2) -> ScopePropagatingStrategy<D, S2> {
        ScopePropagatingStrategy {
            delegate: self.delegate,
            store,
            config: self.config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PropagationConfig {
        &self.config
    }

    /// Captures the calling thread's attribute.
    #[must_use]
    pub fn capture(&self) -> ScopeSnapshot {
        let snapshot = ScopeSnapshot::capture(&self.store);
        tracing::trace!(
            gtid = snapshot.attribute().map(|a| a.gtid.as_str()),
            "captured request scope for submission"
        );
        snapshot
    }
}

/// Span entered while a unit of work runs with a captured attribute.
pub(crate) fn scope_span(snapshot: &ScopeSnapshot, config: &PropagationConfig) -> Span {
    match snapshot.attribute() {
        Some(attribute) if config.record_span => tracing::info_span!(
            "request_scope",
            gtid = %attribute.gtid,
            user_id = attribute.user_id.as_deref(),
        ),
        _ => Span::none(),
    }
}

impl<D, S> ConcurrencyStrategy for ScopePropagatingStrategy<D, S>
where
    D: ConcurrencyStrategy,
    S: ScopeStore,
{
    fn wrap_callable<F, T>(&self, work: F) -> impl FnOnce() -> T + Send + 'static
    where
        F: FnOnce() -> T + Send + 'static,
        T: 'static,
    {
        let snapshot = self.capture();
        let store = self.store.clone();
        let config = self.config.clone();

        let propagating = move || {
            let _guard = snapshot.enter(store);
            let span = scope_span(&snapshot, &config);
            let _entered = span.enter();
            work()
        };
        self.delegate.wrap_callable(propagating)
    }

    fn wrap_future<Fut>(&self, fut: Fut) -> impl Future<Output = Fut::Output> + Send + 'static
    where
        Fut: Future + Send + 'static,
    {
        let snapshot = self.capture();
        let span = scope_span(&snapshot, &self.config);
        let scoped = ScopedFuture::new(fut, snapshot, self.store.clone(), span);
        self.delegate.wrap_future(scoped)
    }
}
