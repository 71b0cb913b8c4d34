//! Tower middleware layers.
//!
//! - [`scope`]: Request-scope propagation into response futures

pub mod scope;

pub use scope::{ScopeExtractor, ScopeLayer, ScopeService};
