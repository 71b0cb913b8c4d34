//! `scopehop` isolation — carries request-scope attributes into pool-managed
//! threads, tokio tasks and tower services.
//!
//! 1. **Strategy** (`strategy`): the `ConcurrencyStrategy` extension point and
//!    the `ScopePropagatingStrategy` that captures, installs and restores
//! 2. **Futures** (`future`): per-poll scope installation for async work
//! 3. **Middleware** (`middleware`): tower layer propagating into response futures
//! 4. **Executor** (`executor`): submission to tokio's blocking pool and scheduler
//! 5. **Worker** (`worker`): channel-fed background worker running scoped tasks

pub mod config;
pub mod error;
pub mod executor;
pub mod future;
pub mod middleware;
pub mod strategy;
pub mod telemetry;
pub mod worker;

pub use config::{LoggingConfig, PropagationConfig, WorkerConfig};
pub use error::IsolationError;
pub use future::{ScopeExt, ScopedFuture};
pub use middleware::{ScopeLayer, ScopeService};
pub use strategy::{ConcurrencyStrategy, PassThroughStrategy, ScopePropagatingStrategy};
pub use worker::{ScopedRunnable, ScopedWorker};
