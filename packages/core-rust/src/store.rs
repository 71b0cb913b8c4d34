//! Thread-confined storage for the current request-scope attribute.
//!
//! Each thread owns exactly one slot holding zero or one attribute. A thread
//! that never had an attribute set observes `None`, never a default value.
//! The only way an attribute reaches another thread is through a
//! [`ScopeSnapshot`](crate::ScopeSnapshot) installed by a
//! [`ScopeGuard`](crate::ScopeGuard).

use std::cell::RefCell;
use std::sync::Arc;

use crate::attribute::ScopeAttribute;

// ---------------------------------------------------------------------------
// ScopeStore trait
// ---------------------------------------------------------------------------

/// Handle to a thread-confined attribute slot.
///
/// Implementations are cheap handles: every method acts on the slot of the
/// calling thread, so a handle can be cloned into closures and futures that
/// later run elsewhere. None of the operations fail or block.
pub trait ScopeStore: Clone + Send + Sync + 'static {
    /// Returns the calling thread's attribute, or `None` if the slot is empty.
    fn get(&self) -> Option<Arc<ScopeAttribute>>;

    /// Replaces the calling thread's slot and returns the previous content.
    fn replace(&self, attribute: Option<Arc<ScopeAttribute>>) -> Option<Arc<ScopeAttribute>>;

    /// Installs `attribute`, overwriting any previous value.
    fn set(&self, attribute: impl Into<Arc<ScopeAttribute>>) {
        self.replace(Some(attribute.into()));
    }

    /// Empties the slot. Clearing an empty slot is a no-op.
    fn clear(&self) {
        self.replace(None);
    }

    /// Mutates the current attribute in place and returns the closure's
    /// result, or `None` when no attribute is set.
    ///
    /// Mutation is copy-on-write: snapshots that already share the attribute
    /// keep the value they captured. The slot is written only after `f`
    /// returns, so a panicking `f` leaves the current attribute in place.
    fn update<R>(&self, f: impl FnOnce(&mut ScopeAttribute) -> R) -> Option<R> {
        let mut current = self.get()?;
        let result = f(Arc::make_mut(&mut current));
        self.replace(Some(current));
        Some(result)
    }
}

// ---------------------------------------------------------------------------
// ThreadLocalStore
// ---------------------------------------------------------------------------

thread_local! {
    static SLOT: RefCell<Option<Arc<ScopeAttribute>>> = const { RefCell::new(None) };
}

/// [`ScopeStore`] backed by a `thread_local!` slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadLocalStore;

impl ScopeStore for ThreadLocalStore {
    fn get(&self) -> Option<Arc<ScopeAttribute>> {
        SLOT.with(|slot| slot.borrow().clone())
    }

    fn replace(&self, attribute: Option<Arc<ScopeAttribute>>) -> Option<Arc<ScopeAttribute>> {
        SLOT.with(|slot| slot.replace(attribute))
    }
}

/// Returns the calling thread's attribute.
#[must_use]
pub fn current() -> Option<Arc<ScopeAttribute>> {
    ThreadLocalStore.get()
}

/// Installs `attribute` on the calling thread.
pub fn set_current(attribute: impl Into<Arc<ScopeAttribute>>) {
    ThreadLocalStore.set(attribute);
}

/// Empties the calling thread's slot.
pub fn clear_current() {
    ThreadLocalStore.clear();
}
