//! Scoped install/restore of a request-scope attribute.

use std::sync::Arc;

use crate::attribute::ScopeAttribute;
use crate::store::ScopeStore;

/// RAII guard that installs an attribute on the current thread and restores
/// the slot's prior content when dropped.
///
/// Restoration happens on normal return, early return and panic unwinding
/// alike, since `Drop` runs during unwinding. The guard puts back exactly
/// what it found: it never blindly clears, so guards nest correctly.
///
/// A guard must be dropped on the thread that created it; it is `!Send`.
#[derive(Debug)]
pub struct ScopeGuard<S: ScopeStore> {
    store: S,
    prior: Option<Arc<ScopeAttribute>>,
    _not_send: std::marker::PhantomData<*const ()>,
}

impl<S: ScopeStore> ScopeGuard<S> {
    /// Records the slot's current content and installs `attribute` when one
    /// is given. An absent attribute leaves the slot untouched.
    #[must_use = "the attribute is uninstalled as soon as the guard is dropped"]
    pub fn install(store: S, attribute: Option<Arc<ScopeAttribute>>) -> Self {
        let prior = match attribute {
            Some(attribute) => {
                tracing::trace!(gtid = %attribute.gtid, "installing request scope");
                store.replace(Some(attribute))
            }
            None => store.get(),
        };
        Self {
            store,
            prior,
            _not_send: std::marker::PhantomData,
        }
    }

    /// Empties the slot until the guard is dropped, for work that belongs to
    /// no request.
    #[must_use = "the slot is refilled as soon as the guard is dropped"]
    pub fn isolate(store: S) -> Self {
        let prior = store.replace(None);
        Self {
            store,
            prior,
            _not_send: std::marker::PhantomData,
        }
    }

    /// The slot content that will be put back on drop.
    #[must_use]
    pub fn prior(&self) -> Option<&Arc<ScopeAttribute>> {
        self.prior.as_ref()
    }
}

impl<S: ScopeStore> Drop for ScopeGuard<S> {
    fn drop(&mut self) {
        let prior = self.prior.take();
        tracing::trace!(
            restored_gtid = prior.as_ref().map(|a| a.gtid.as_str()),
            "restoring request scope"
        );
        self.store.replace(prior);
    }
}
