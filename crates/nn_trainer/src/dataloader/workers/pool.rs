//! Worker pool implementation for background data loading.
//!
//! Provides a small thread pool that manages worker lifecycle, task
//! distribution, and result collection. The sample provider runs its
//! persistent prefetch worker on it.
//!
//! # Key features
//! - Bounded channels prevent memory bloat
//! - Graceful shutdown on drop
//! - Thread-local worker IDs for debugging
//! - Generic over task and output types for flexibility

use anyhow::{anyhow, ensure, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::dataloader::common::thread::WORKER_ID;

/// Thread pool for background data loading.
///
/// Manages worker lifecycle and communication through bounded channels:
/// - Task channel: Main thread -> Workers (work distribution)
/// - Output channel: Workers -> Main thread (result collection)
/// - Shutdown flag: Enables graceful termination
///
/// # Type Parameters
/// - `Task`: Work items sent to workers
/// - `Output`: Results returned from workers
pub(crate) struct WorkerPool<Task, Output> {
    workers: Vec<thread::JoinHandle<()>>,
    task_tx: Option<Sender<Task>>,
    output_rx: Receiver<Output>,
    shutdown: Arc<AtomicBool>,
}

impl<Task, Output> WorkerPool<Task, Output>
where
    Task: Send + 'static,
    Output: Send + 'static,
{
    /// Creates a new worker pool with a shared task channel.
    ///
    /// Workers pull from a single queue; threads are named `{name}-{id}`.
    pub(crate) fn new<F>(
        name: &str,
        num_workers: usize,
        buffer_size: usize,
        worker_fn: F,
    ) -> Result<Self>
    where
        F: Fn(Receiver<Task>, Sender<Output>, Arc<AtomicBool>) + Send + Sync + 'static,
    {
        ensure!(
            num_workers > 0,
            "Cannot create WorkerPool with 0 workers. \
            Either set num_workers > 0 or use single-threaded mode."
        );
        ensure!(
            buffer_size > 0,
            "Cannot create WorkerPool with buffer_size 0. \
            Buffer size must be > 0 to prevent deadlocks."
        );

        let (task_tx, task_rx) = bounded(buffer_size);
        let (output_tx, output_rx) = bounded(buffer_size);

        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_fn = Arc::new(worker_fn);
        let mut pool = Self {
            workers: Vec::with_capacity(num_workers),
            task_tx: Some(task_tx),
            output_rx,
            shutdown: shutdown.clone(),
        };

        // Spawn workers. On failure `pool` is dropped, which joins the
        // workers that did start.
        for worker_id in 0..num_workers {
            let task_rx = task_rx.clone();
            let output_tx = output_tx.clone();
            let shutdown_clone = shutdown.clone();
            let worker_fn_clone = worker_fn.clone();

            let handle = thread::Builder::new()
                .name(format!("{}-{}", name, worker_id))
                .spawn(move || {
                    WORKER_ID.with(|id| *id.borrow_mut() = worker_id);
                    worker_fn_clone(task_rx, output_tx, shutdown_clone);
                })
                .with_context(|| format!("Failed to spawn worker thread {}", worker_id))?;

            pool.workers.push(handle);
        }

        Ok(pool)
    }

    /// Hands a task to the workers, blocking while the task buffer is full.
    pub(crate) fn submit(&self, task: Task) -> Result<()> {
        let task_tx = self
            .task_tx
            .as_ref()
            .ok_or_else(|| anyhow!("Worker pool is shutting down"))?;
        task_tx
            .send(task)
            .map_err(|_| anyhow!("All workers have terminated; cannot submit task"))
    }

    /// Blocks until a worker publishes an output.
    ///
    /// Fails instead of hanging when every worker has exited (e.g. after a
    /// panic) and nothing is buffered.
    pub(crate) fn recv(&self) -> Result<Output> {
        self.output_rx
            .recv()
            .map_err(|_| anyhow!("Workers terminated before delivering a result"))
    }

    pub(crate) fn num_workers(&self) -> usize {
        self.workers.len()
    }
}

impl<Task, Output> Drop for WorkerPool<Task, Output> {
    fn drop(&mut self) {
        // Signal shutdown to all workers
        self.shutdown.store(true, Ordering::Relaxed);

        // Drop the task sender to close the channel
        self.task_tx.take();

        // Wait for workers to finish
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::warn!("Worker thread panicked before shutdown");
            }
        }
    }
}
