//! `scopehop` core: request-scope attributes, the thread-confined store that
//! holds them, and the snapshot/guard protocol used to carry them across
//! thread hops.

pub mod attribute;
pub mod error;
pub mod guard;
pub mod snapshot;
pub mod store;

pub use attribute::{LogLevel, ScopeAttribute};
pub use error::ScopeError;
pub use guard::ScopeGuard;
pub use snapshot::ScopeSnapshot;
pub use store::{clear_current, current, set_current, ScopeStore, ThreadLocalStore};
