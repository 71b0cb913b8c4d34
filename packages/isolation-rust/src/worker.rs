//! Background worker that runs submitted tasks inside their submitter's
//! request scope.
//!
//! Provides a generic `ScopedWorker<R>` that processes tasks from an mpsc
//! channel via a `ScopedRunnable` implementation, with optional periodic tick
//! callbacks. Every task travels with the snapshot captured when it was
//! submitted.

use std::future::Future;

use async_trait::async_trait;
use scopehop_core::{ScopeSnapshot, ScopeStore, ThreadLocalStore};
use tokio::sync::mpsc;

use crate::config::{PropagationConfig, WorkerConfig};
use crate::error::IsolationError;
use crate::future::ScopedFuture;
use crate::strategy::scope_span;

// ---------------------------------------------------------------------------
// ScopedRunnable trait
// ---------------------------------------------------------------------------

/// Trait for task handlers executed by `ScopedWorker`.
///
/// `run` executes inside the submitting thread's request scope. `on_tick` and
/// `shutdown` are not tied to any request and run with the slot emptied,
/// whatever the polling thread holds.
#[async_trait]
pub trait ScopedRunnable: Send + 'static {
    /// The type of task this runnable processes.
    type Task: Send + 'static;

    /// Process a single task.
    async fn run(&mut self, task: Self::Task);

    /// Called periodically (on each tick interval). Default is a no-op.
    async fn on_tick(&mut self) {}

    /// Called once when the worker is shutting down. Default is a no-op.
    async fn shutdown(&mut self) {}
}

// ---------------------------------------------------------------------------
// ScopedWorker
// ---------------------------------------------------------------------------

type Envelope<T> = (ScopeSnapshot, T);

/// Generic background worker that processes scoped tasks via an mpsc channel.
///
/// The worker spawns a tokio task that:
/// 1. Listens for `(snapshot, task)` pairs on the mpsc channel
/// 2. Calls `ScopedRunnable::run()` for each task inside its snapshot
/// 3. Periodically calls `ScopedRunnable::on_tick()` at the configured interval
/// 4. Calls `ScopedRunnable::shutdown()` when stopped
pub struct ScopedWorker<R: ScopedRunnable, S: ScopeStore = ThreadLocalStore> {
    store: S,
    tx: Option<mpsc::Sender<Envelope<R::Task>>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl<R: ScopedRunnable> ScopedWorker<R> {
    /// Start the worker on the thread-local store.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(runnable: R, config: &WorkerConfig) -> Self {
        Self::start_with(runnable, config, &PropagationConfig::default(), ThreadLocalStore)
    }
}

impl<R: ScopedRunnable, S: ScopeStore> ScopedWorker<R, S> {
    /// Start the worker with an explicit store and propagation settings.
    pub fn start_with(
        mut runnable: R,
        config: &WorkerConfig,
        propagation: &PropagationConfig,
        store: S,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<Envelope<R::Task>>(config.channel_capacity);
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let tick_every = config.tick_interval;
        let propagation = propagation.clone();
        let task_store = store.clone();

        let handle = tokio::spawn(async move {
            let mut tick_interval = tokio::time::interval(tick_every);
            // Skip the first immediate tick so on_tick doesn't fire at startup.
            tick_interval.tick().await;

            loop {
                tokio::select! {
                    envelope = rx.recv() => {
                        match envelope {
                            Some((snapshot, task)) => {
                                let span = scope_span(&snapshot, &propagation);
                                ScopedFuture::new(runnable.run(task), snapshot, task_store.clone(), span)
                                    .await;
                            }
                            None => break, // Channel closed.
                        }
                    }
                    _ = tick_interval.tick() => {
                        ScopedFuture::isolated(runnable.on_tick(), task_store.clone()).await;
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }

            ScopedFuture::isolated(runnable.shutdown(), task_store).await;
            tracing::debug!("scoped worker stopped");
        });

        Self {
            store,
            tx: Some(tx),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Submit a task, capturing the calling thread's scope immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has been stopped or its task loop has exited.
    pub fn submit(
        &self,
        task: R::Task,
    ) -> impl Future<Output = Result<(), IsolationError>> + Send + '_ {
        let envelope = (ScopeSnapshot::capture(&self.store), task);
        async move {
            match &self.tx {
                Some(tx) => tx
                    .send(envelope)
                    .await
                    .map_err(|_| IsolationError::WorkerClosed),
                None => Err(IsolationError::WorkerNotRunning),
            }
        }
    }

    /// Submit without waiting for channel capacity. Usable from non-async threads.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has been stopped, its task loop has
    /// exited, or the channel is full.
    pub fn try_submit(&self, task: R::Task) -> Result<(), IsolationError> {
        let Some(tx) = &self.tx else {
            return Err(IsolationError::WorkerNotRunning);
        };
        tx.try_send((ScopeSnapshot::capture(&self.store), task))
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => IsolationError::WorkerFull,
                mpsc::error::TrySendError::Closed(_) => IsolationError::WorkerClosed,
            })
    }

    /// Stop the worker gracefully, waiting for the worker task to complete.
    pub async fn stop(&mut self) {
        // Signal shutdown.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // Close the task channel.
        self.tx.take();
        // Wait for the worker task to finish.
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
