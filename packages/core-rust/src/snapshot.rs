//! Point-in-time capture of a thread's request-scope attribute, carried to
//! the thread that runs the work and installed there.

use std::sync::Arc;

use crate::attribute::ScopeAttribute;
use crate::guard::ScopeGuard;
use crate::store::ScopeStore;

/// Attribute captured from a submitting thread, or the record that nothing
/// was set there.
///
/// Snapshots are taken eagerly: the submitting thread may clear or reuse its
/// slot before the work runs, and the snapshot keeps what was current at
/// capture time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSnapshot {
    attribute: Option<Arc<ScopeAttribute>>,
}

impl ScopeSnapshot {
    /// Reads the calling thread's slot.
    #[must_use]
    pub fn capture<S: ScopeStore>(store: &S) -> Self {
        Self {
            attribute: store.get(),
        }
    }

    /// A snapshot of a thread with no attribute set.
    #[must_use]
    pub fn absent() -> Self {
        Self { attribute: None }
    }

    #[must_use]
    pub fn of(attribute: impl Into<Arc<ScopeAttribute>>) -> Self {
        Self {
            attribute: Some(attribute.into()),
        }
    }

    #[must_use]
    pub fn attribute(&self) -> Option<&Arc<ScopeAttribute>> {
        self.attribute.as_ref()
    }

    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.attribute.is_none()
    }

    /// Installs this snapshot on the calling thread until the returned guard
    /// is dropped.
    #[must_use = "the snapshot is uninstalled as soon as the guard is dropped"]
    pub fn enter<S: ScopeStore>(&self, store: S) -> ScopeGuard<S> {
        ScopeGuard::install(store, self.attribute.clone())
    }

    /// Runs `f` with this snapshot installed, restoring the slot afterwards.
    pub fn run<S: ScopeStore, T>(&self, store: S, f: impl FnOnce() -> T) -> T {
        let _guard = self.enter(store);
        f()
    }
}
