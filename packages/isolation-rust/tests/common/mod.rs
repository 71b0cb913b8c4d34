//! Shared test support: a single-thread executor standing in for an
//! isolation framework's pool, so tests can observe a reused pooled thread.

#![allow(dead_code)]

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use scopehop_core::{ScopeAttribute, ScopeStore, ThreadLocalStore};
use tokio::sync::{mpsc, oneshot};

type Job = Box<dyn FnOnce() + Send>;

/// Executes submitted jobs one after another on a single dedicated thread.
pub struct SingleThreadExecutor {
    tx: Option<mpsc::UnboundedSender<Job>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SingleThreadExecutor {
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let handle = thread::Builder::new()
            .name("isolation-pool-0".to_string())
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    job();
                }
            })
            .expect("spawn pool thread");
        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    /// Queues `work`; the receiver yields its output or its panic payload.
    pub fn submit<F, T>(&self, work: F) -> oneshot::Receiver<thread::Result<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            let _ = done_tx.send(panic::catch_unwind(AssertUnwindSafe(work)));
        });
        self.tx
            .as_ref()
            .expect("executor running")
            .send(job)
            .expect("pool thread alive");
        done_rx
    }

    /// Queues `work` behind a cancellation flag checked when the job is
    /// dequeued. Cancelled work is dropped on the pool thread unexecuted and
    /// its receiver reports a closed channel.
    pub fn submit_cancellable<F, T>(
        &self,
        work: F,
    ) -> (Arc<AtomicBool>, oneshot::Receiver<thread::Result<T>>)
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            if flag.load(Ordering::SeqCst) {
                drop(work);
                return;
            }
            let _ = done_tx.send(panic::catch_unwind(AssertUnwindSafe(work)));
        });
        self.tx
            .as_ref()
            .expect("executor running")
            .send(job)
            .expect("pool thread alive");
        (cancelled, done_rx)
    }

    /// Runs `work` on the pool thread and waits for it.
    pub fn call<F, T>(&self, work: F) -> thread::Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit(work).blocking_recv().expect("pool thread alive")
    }

    /// Reads the pool thread's slot without any wrapping.
    pub fn probe(&self) -> Option<Arc<ScopeAttribute>> {
        self.call(|| ThreadLocalStore.get()).expect("probe never panics")
    }

    /// Writes the pool thread's slot without any wrapping.
    pub fn plant(&self, attribute: Option<Arc<ScopeAttribute>>) {
        self.call(move || {
            ThreadLocalStore.replace(attribute);
        })
        .expect("plant never panics");
    }

    pub fn thread_id(&self) -> thread::ThreadId {
        self.call(|| thread::current().id()).expect("thread id never panics")
    }
}

impl Drop for SingleThreadExecutor {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Empty slot for the calling test thread.
pub fn fresh_store() -> ThreadLocalStore {
    let store = ThreadLocalStore;
    store.clear();
    store
}
