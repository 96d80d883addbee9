//! src/dataloader/workers/prefetch.rs
//!
//! The persistent background worker behind [`SampleProvider`].
//!
//! The worker owns a [`Materializer`] clone (shared `Arc`s, no back-pointer
//! into the provider), waits for a request, materializes it without holding
//! any lock, and publishes the tagged result. Failures travel back as
//! `Err` values and are re-raised by the consumer.
//!
//! [`SampleProvider`]: crate::dataloader::SampleProvider

use crate::dataloader::common::thread::current_worker_id;
use crate::dataloader::materialize::Materializer;
use crate::sample::Sample;
use anyhow::Result;
use crossbeam_channel::RecvTimeoutError;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::pool::WorkerPool;

/// Entry indices of the next batch to load.
#[derive(Debug)]
pub(crate) struct PrefetchRequest {
    pub(crate) entry_indices: Vec<usize>,
}

/// The materialized batch, tagged with the indices it was requested for.
pub(crate) struct PrefetchResult {
    pub(crate) entry_indices: Vec<usize>,
    pub(crate) batch: Result<Vec<Sample>>,
}

/// Spawns the single prefetch worker (task and result buffers of one).
pub(crate) fn spawn_prefetch_worker(
    materializer: Materializer,
    poll_interval: Duration,
) -> Result<WorkerPool<PrefetchRequest, PrefetchResult>> {
    WorkerPool::new(
        "nn-trainer-prefetch",
        1,
        1,
        move |task_rx, output_tx, shutdown| {
            let worker_id = current_worker_id();
            tracing::debug!(worker = worker_id, "Prefetch worker started");

            loop {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }

                let request = match task_rx.recv_timeout(poll_interval) {
                    Ok(request) => request,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                };

                let PrefetchRequest { entry_indices } = request;
                let batch = materializer.load_batch(&entry_indices);
                if let Err(err) = &batch {
                    tracing::debug!(worker = worker_id, error = %err, "Prefetch failed");
                }

                if output_tx
                    .send(PrefetchResult {
                        entry_indices,
                        batch,
                    })
                    .is_err()
                {
                    break;
                }
            }

            tracing::debug!(worker = worker_id, "Prefetch worker stopped");
        },
    )
}
