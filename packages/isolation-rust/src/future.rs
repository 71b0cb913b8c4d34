//! Request-scope propagation for futures.
//!
//! A future may be polled on a different runtime worker thread each time it
//! is woken. [`ScopedFuture`] installs its captured attribute around every
//! poll and restores the polling thread's slot as soon as the poll returns,
//! so the attribute follows the future without lingering on any thread.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use scopehop_core::{ScopeGuard, ScopeSnapshot, ScopeStore, ThreadLocalStore};
use tracing::Span;

use crate::config::PropagationConfig;
use crate::strategy::scope_span;

/// Future wrapper that runs each poll of `F` inside a captured request scope.
///
/// An isolated wrapper instead empties the slot for each poll, for work
/// that must not observe any request.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct ScopedFuture<F, S = ThreadLocalStore> {
    inner: Pin<Box<F>>,
    snapshot: ScopeSnapshot,
    store: S,
    span: Span,
    isolated: bool,
}

// `inner` is boxed and never projected, so the wrapper can move freely.
impl<F, S> Unpin for ScopedFuture<F, S> {}

impl<F, S: ScopeStore> ScopedFuture<F, S> {
    pub fn new(inner: F, snapshot: ScopeSnapshot, store: S, span: Span) -> Self {
        Self {
            inner: Box::pin(inner),
            snapshot,
            store,
            span,
            isolated: false,
        }
    }

    /// Polls `inner` with the slot emptied, whatever the polling thread holds.
    pub fn isolated(inner: F, store: S) -> Self {
        Self {
            inner: Box::pin(inner),
            snapshot: ScopeSnapshot::absent(),
            store,
            span: Span::none(),
            isolated: true,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> &ScopeSnapshot {
        &self.snapshot
    }
}

impl<F: Future, S: ScopeStore> Future for ScopedFuture<F, S> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let _guard = if this.isolated {
            ScopeGuard::isolate(this.store.clone())
        } else {
            this.snapshot.enter(this.store.clone())
        };
        let _entered = this.span.enter();
        this.inner.as_mut().poll(cx)
    }
}

// ---------------------------------------------------------------------------
// ScopeExt
// ---------------------------------------------------------------------------

/// Attaches request scopes to futures, in the manner of
/// `tracing::Instrument`.
pub trait ScopeExt: Future + Sized {
    /// Runs this future inside `snapshot`.
    fn with_scope(self, snapshot: ScopeSnapshot) -> ScopedFuture<Self> {
        let span = scope_span(&snapshot, &PropagationConfig::default());
        ScopedFuture::new(self, snapshot, ThreadLocalStore, span)
    }

    /// Runs this future inside the attribute current on the calling thread.
    fn in_current_scope(self) -> ScopedFuture<Self> {
        self.with_scope(ScopeSnapshot::capture(&ThreadLocalStore))
    }

    /// Runs this future with no attribute visible.
    fn without_scope(self) -> ScopedFuture<Self> {
        ScopedFuture::isolated(self, ThreadLocalStore)
    }
}

impl<F: Future> ScopeExt for F {}
