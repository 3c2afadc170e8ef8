//! Bounded worker pool with tenant context propagation.
//!
//! A fixed set of long-lived tokio tasks pull jobs from one shared mpsc
//! channel. Each worker runs inside its own unit-of-work scope that starts
//! empty. Every job is wrapped by [`ContextPropagator`] at submission, so it
//! runs under the submitter's tenant and leaves the worker's slot empty when
//! it finishes, fails or panics. There is no way to enqueue an unwrapped job.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::service::config::WorkerPoolConfig;
use crate::tenancy::{ContextPropagator, TenantContextStore};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

// ---------------------------------------------------------------------------
// WorkerPool
// ---------------------------------------------------------------------------

/// Fixed-size pool of async workers fed by a bounded queue.
///
/// Shared as `Arc<WorkerPool>`; both submission and shutdown take `&self`.
pub struct WorkerPool {
    tx: SyncMutex<Option<mpsc::Sender<Job>>>,
    handles: SyncMutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Start `config.worker_count` workers sharing a queue of
    /// `config.queue_capacity` jobs. Both are raised to at least one.
    #[must_use]
    pub fn start(config: &WorkerPoolConfig) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let workers = config.worker_count.max(1);

        let handles = (0..workers)
            .map(|worker| {
                let rx = Arc::clone(&rx);
                tokio::spawn(TenantContextStore::scope(None, worker_loop(worker, rx)))
            })
            .collect();

        info!(workers, queue_capacity = config.queue_capacity, "worker pool started");
        Self {
            tx: SyncMutex::new(Some(tx)),
            handles: SyncMutex::new(handles),
        }
    }

    /// Workers still running; 0 once stopped.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.handles.lock().len()
    }

    /// Queue `task` to run under the caller's current tenant context.
    ///
    /// Waits for queue space. The returned receiver yields the task's output,
    /// or an error if the task panicked.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool has been stopped.
    pub async fn submit<F, T>(&self, task: F) -> anyhow::Result<oneshot::Receiver<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let Some(tx) = self.tx.lock().clone() else {
            return Err(anyhow::anyhow!("worker pool not running"));
        };
        let wrapped = ContextPropagator::wrap(task);
        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            // Receiver may have been dropped; the result is simply discarded.
            let _ = done_tx.send(wrapped.await);
        });
        tx.send(job)
            .await
            .map_err(|_| anyhow::anyhow!("worker pool channel closed"))?;
        Ok(done_rx)
    }

    /// Stop accepting jobs, let workers drain the queue, and wait for them.
    pub async fn stop(&self) {
        self.tx.lock().take();
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            let _ = handle.await;
        }
        info!("worker pool stopped");
    }
}

async fn worker_loop(worker: usize, rx: Arc<Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let job = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(job) = job else {
            break; // Channel closed and drained.
        };
        match AssertUnwindSafe(job).catch_unwind().await {
            Ok(()) => {
                metrics::counter!("tenantry_pool_tasks_total", "outcome" => "ok").increment(1);
            }
            Err(_) => {
                warn!(worker, "pool task panicked");
                metrics::counter!("tenantry_pool_tasks_total", "outcome" => "panicked")
                    .increment(1);
            }
        }
    }
    debug!(worker, "worker exiting");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
