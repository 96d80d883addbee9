//! src/dataloader/config.rs
//!
//! Configuration for DataLoader behaviour
//!
//! The `LoaderConfig` struct stores the parameters that control how samples
//! are materialized: how many I/O threads decode a batch, which augmentation
//! ops run on synthetic entries, and how often the idle prefetch worker
//! checks for shutdown.
//!
//! Example:
//! ```ignore
//! let config = LoaderConfig::builder()
//!     .io_threads(4)
//!     .transforms(AugmentationTransforms::none())
//!     .build();
//! ```
//!
//! # Performance considerations:
//! - `io_threads`: More threads speed up decode-heavy batches but compete
//!                 with the training threads for cores.
//! - `worker_timeout`: Clamped to [`MIN_WORKER_TIMEOUT`]; a zero interval
//!                     would spin the idle worker.

use crate::transforms::AugmentationTransforms;
use std::time::Duration;

/// Shortest polling interval the prefetch worker accepts.
pub const MIN_WORKER_TIMEOUT: Duration = Duration::from_millis(1);

/// Configuration for DataLoader
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Threads in the materialization pool (0 = available parallelism)
    pub io_threads: usize,
    /// Augmentation ops applied to synthetic entries
    pub transforms: AugmentationTransforms,
    /// How often the idle prefetch worker checks the shutdown flag.
    /// Not an error timeout - just a polling interval. Default: 100ms,
    /// never below [`MIN_WORKER_TIMEOUT`].
    pub worker_timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            io_threads: 0,
            transforms: AugmentationTransforms::default(),
            worker_timeout: Duration::from_millis(100),
        }
    }
}

impl LoaderConfig {
    pub fn builder() -> LoaderConfigBuilder {
        LoaderConfigBuilder::default()
    }

    /// `io_threads` with `0` resolved to the machine's available parallelism.
    pub fn effective_io_threads(&self) -> usize {
        crate::parallel::resolve_thread_count(self.io_threads)
    }

    /// `worker_timeout` raised to at least [`MIN_WORKER_TIMEOUT`].
    pub fn effective_worker_timeout(&self) -> Duration {
        self.worker_timeout.max(MIN_WORKER_TIMEOUT)
    }
}

/// Builder for LoaderConfig with method chaining
#[derive(Default)]
pub struct LoaderConfigBuilder {
    config: LoaderConfig,
}

impl LoaderConfigBuilder {
    /// Set the number of materialization threads
    pub fn io_threads(mut self, threads: usize) -> Self {
        self.config.io_threads = threads;
        self
    }

    /// Select the augmentation ops
    pub fn transforms(mut self, transforms: AugmentationTransforms) -> Self {
        self.config.transforms = transforms;
        self
    }

    /// Set the worker polling interval
    ///
    /// - Too low: More responsive shutdown, higher CPU usage.
    /// - Too high: Less CPU overhead, slower shutdown response
    ///
    /// Values below [`MIN_WORKER_TIMEOUT`] are raised to it.
    pub fn worker_timeout(mut self, worker_timeout: Duration) -> Self {
        self.config.worker_timeout = worker_timeout.max(MIN_WORKER_TIMEOUT);
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> LoaderConfig {
        self.config
    }
}
