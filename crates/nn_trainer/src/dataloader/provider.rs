//! src/dataloader/provider.rs
//!
//! Double-buffered batch delivery for the training loop.
//!
//! While the caller trains on batch `k`, one persistent background worker
//! materializes batch `k + 1`. The provider is a two-state machine:
//!
//! - **Idle**: nothing in flight; the next `get_batch` loads synchronously.
//! - **Requested**: the worker is loading (or has loaded) the batch after the
//!   one last returned; `get_batch` waits for it if needed.
//!
//! Every `get_batch` that is not the last batch of the permutation leaves the
//! provider Requested; the last one leaves it Idle, so batch 0 of the next
//! epoch is always loaded synchronously.
//!
//! A pending prefetch is only served to the call that continues the walk it
//! was issued for: the same batch index and exactly the same entries. Batch 0
//! never matches, so a new permutation always starts with a synchronous load
//! even when its first slice equals the in-flight one. Any other mismatch (an
//! out-of-order batch index, a different batch size) also waits for the stale
//! result, discards it and loads the batch synchronously.
//!
//! Dropping the provider closes the request channel, sets the shutdown flag
//! and joins the worker, even while a prefetch is in flight.

use crate::sample::Sample;
use anyhow::{ensure, Context, Result};

use super::materialize::Materializer;
use super::workers::pool::WorkerPool;
use super::workers::prefetch::{spawn_prefetch_worker, PrefetchRequest, PrefetchResult};
use super::LoaderConfig;

/// Delivers batches of materialized samples, prefetching the next batch on
/// a background thread.
///
/// Created by [`DataLoader::make_sample_provider`]; one provider per training
/// run. `get_batch` takes `&mut self`, so a provider is driven by exactly one
/// caller at a time.
///
/// [`DataLoader::make_sample_provider`]: crate::dataloader::DataLoader::make_sample_provider
pub struct SampleProvider {
    materializer: Materializer,
    worker: WorkerPool<PrefetchRequest, PrefetchResult>,
    /// The in-flight request (`Some` = Requested).
    pending: Option<PendingBatch>,
}

/// What the in-flight prefetch was issued for.
#[derive(Debug)]
struct PendingBatch {
    batch_index: usize,
    entry_indices: Vec<usize>,
}

impl PendingBatch {
    fn serves(&self, batch_index: usize, wanted: &[usize]) -> bool {
        batch_index != 0 && self.batch_index == batch_index && self.entry_indices == wanted
    }
}

impl std::fmt::Debug for SampleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleProvider")
            .field("num_entries", &self.materializer.num_entries())
            .field("pending", &self.pending)
            .finish()
    }
}

impl SampleProvider {
    pub(crate) fn new(materializer: Materializer, config: &LoaderConfig) -> Result<Self> {
        let poll_interval = config.effective_worker_timeout();
        let worker = spawn_prefetch_worker(materializer.clone(), poll_interval)
            .context("Failed to start the prefetch worker")?;
        tracing::debug!(
            entries = materializer.num_entries(),
            workers = worker.num_workers(),
            "Sample provider started"
        );

        Ok(Self {
            materializer,
            worker,
            pending: None,
        })
    }

    /// Returns batch `batch_index` of `shuffled_indices`, i.e. the samples for
    /// `shuffled_indices[batch_index * batch_size..]` (at most `batch_size`;
    /// the last batch may be short), in that order.
    ///
    /// Before returning, the next batch of the same permutation is handed to
    /// the background worker unless this was the last one.
    ///
    /// # Errors
    /// - `batch_size == 0` or `batch_index` past the end of `shuffled_indices`
    /// - any decode/transform failure, whether it happened synchronously or
    ///   in the background worker
    /// - the background worker died
    pub fn get_batch(
        &mut self,
        shuffled_indices: &[usize],
        batch_size: usize,
        batch_index: usize,
    ) -> Result<Vec<Sample>> {
        ensure!(batch_size > 0, "Batch size must be greater than 0");

        let total = shuffled_indices.len();
        let start = batch_index.saturating_mul(batch_size);
        ensure!(
            start < total,
            "Batch index {} out of range: {} indices with batch size {}",
            batch_index,
            total,
            batch_size
        );
        let end = (start + batch_size).min(total);
        let wanted = &shuffled_indices[start..end];

        let batch = match self.take_prefetched(batch_index, wanted)? {
            Some(batch) => {
                batch.with_context(|| format!("Prefetched batch {} failed to load", batch_index))?
            }
            None => self
                .materializer
                .load_batch(wanted)
                .with_context(|| format!("Batch {} failed to load", batch_index))?,
        };

        if end < total {
            let next_end = (end + batch_size).min(total);
            let next = shuffled_indices[end..next_end].to_vec();
            self.worker.submit(PrefetchRequest {
                entry_indices: next.clone(),
            })?;
            self.pending = Some(PendingBatch {
                batch_index: batch_index + 1,
                entry_indices: next,
            });
        }

        Ok(batch)
    }

    /// `true` while a prefetch request is in flight (or its result is ready
    /// but not yet consumed).
    pub fn has_pending_prefetch(&self) -> bool {
        self.pending.is_some()
    }

    /// Consumes the pending prefetch, if any. Returns `None` when nothing was
    /// pending or the pending result was issued for another batch.
    fn take_prefetched(
        &mut self,
        batch_index: usize,
        wanted: &[usize],
    ) -> Result<Option<Result<Vec<Sample>>>> {
        let Some(pending) = self.pending.take() else {
            return Ok(None);
        };

        let result = self
            .worker
            .recv()
            .context("Prefetch worker stopped unexpectedly")?;
        debug_assert_eq!(result.entry_indices, pending.entry_indices);

        if !pending.serves(batch_index, wanted) {
            tracing::debug!(
                prefetched_batch = pending.batch_index,
                requested_batch = batch_index,
                "Discarding stale prefetch"
            );
            return Ok(None);
        }
        Ok(Some(result.batch))
    }
}

impl Drop for SampleProvider {
    fn drop(&mut self) {
        tracing::debug!(
            in_flight = self.pending.is_some(),
            "Sample provider shutting down"
        );
        // `worker` joins its thread when dropped.
    }
}
