//! Scope propagation middleware.
//!
//! Captures the request scope when a request is submitted and runs the inner
//! service's response future inside it, wherever that future ends up being
//! polled (e.g. behind a `tower::buffer` worker task).

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use scopehop_core::{ScopeAttribute, ScopeSnapshot, ScopeStore, ThreadLocalStore};
use tower::{Layer, Service};

use crate::config::PropagationConfig;
use crate::future::ScopedFuture;
use crate::strategy::scope_span;

/// Derives a request's attribute from the request itself.
pub type ScopeExtractor<Req> = Arc<dyn Fn(&Req) -> Option<ScopeAttribute> + Send + Sync>;

// ---------------------------------------------------------------------------
// ScopeLayer
// ---------------------------------------------------------------------------

/// Tower layer that propagates the request scope into the response future.
///
/// Without an extractor the attribute current on the calling thread is
/// captured. With one, the attribute it returns for a request takes
/// precedence; `None` falls back to the calling thread's attribute.
pub struct ScopeLayer<Req, S = ThreadLocalStore> {
    store: S,
    extractor: Option<ScopeExtractor<Req>>,
    config: PropagationConfig,
}

impl<Req> ScopeLayer<Req> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(ThreadLocalStore)
    }
}

impl<Req> Default for ScopeLayer<Req> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, S: ScopeStore> ScopeLayer<Req, S> {
    #[must_use]
    pub fn with_store(store: S) -> Self {
        Self {
            store,
            extractor: None,
            config: PropagationConfig::default(),
        }
    }

    /// Reads the attribute from each request before consulting the store.
    #[must_use]
    pub fn extract_with(
        mut self,
        extractor: impl Fn(&Req) -> Option<ScopeAttribute> + Send + Sync + 'static,
    ) -> Self {
        self.extractor = Some(Arc::new(extractor));
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: PropagationConfig) -> Self {
        self.config = config;
        self
    }
}

impl<Req, S: Clone> Clone for ScopeLayer<Req, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            extractor: self.extractor.clone(),
            config: self.config.clone(),
        }
    }
}

impl<Req, S: fmt::Debug> fmt::Debug for ScopeLayer<Req, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeLayer")
            .field("store", &self.store)
            .field("extractor", &self.extractor.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl<Svc, Req, S: ScopeStore> Layer<Svc> for ScopeLayer<Req, S> {
    type Service = ScopeService<Svc, Req, S>;

    fn layer(&self, inner: Svc) -> Self::Service {
        ScopeService {
            inner,
            layer: self.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// ScopeService
// ---------------------------------------------------------------------------

/// Service wrapper that runs each call inside the request's scope.
pub struct ScopeService<Svc, Req, S = ThreadLocalStore> {
    inner: Svc,
    layer: ScopeLayer<Req, S>,
}

impl<Svc: Clone, Req, S: Clone> Clone for ScopeService<Svc, Req, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            layer: self.layer.clone(),
        }
    }
}

impl<Svc: fmt::Debug, Req, S: fmt::Debug> fmt::Debug for ScopeService<Svc, Req, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeService")
            .field("inner", &self.inner)
            .field("layer", &self.layer)
            .finish()
    }
}

impl<Svc, Req, S> ScopeService<Svc, Req, S>
where
    S: ScopeStore,
{
    fn snapshot_for(&self, req: &Req) -> ScopeSnapshot {
        self.layer
            .extractor
            .as_ref()
            .and_then(|extract| extract(req))
            .map_or_else(|| ScopeSnapshot::capture(&self.layer.store), ScopeSnapshot::of)
    }
}

impl<Svc, Req, S> Service<Req> for ScopeService<Svc, Req, S>
where
    Svc: Service<Req>,
    S: ScopeStore,
{
    type Response = Svc::Response;
    type Error = Svc::Error;
    type Future = ScopedFuture<Svc::Future, S>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let snapshot = self.snapshot_for(&req);
        let span = scope_span(&snapshot, &self.layer.config);

        // The inner service may do synchronous work in `call`; run it in scope too.
        let fut = {
            let _guard = snapshot.enter(self.layer.store.clone());
            let _entered = span.enter();
            self.inner.call(req)
        };
        ScopedFuture::new(fut, snapshot, self.layer.store.clone(), span)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
