//! src/dataloader/mod.rs
//!
//! This module implements the `DataLoader` and its asynchronous
//! `SampleProvider`.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────┐
//!                    │ Manifest │ (references or resident samples)
//!                    └────┬─────┘
//!                         │ expected outputs
//!                         ↓
//!                  ┌──────────────┐
//!                  │   Planner    │ (class balance / augmentation factor)
//!                  └──────┬───────┘
//!                         │ augmented entries
//!                         ↓
//!                  ┌──────────────┐
//!                  │  DataLoader  │ ←───── LoaderConfig (io_threads, transforms)
//!                  └──────┬───────┘
//!                         │ make_sample_provider()
//!                         ↓
//!                 ┌────────────────┐
//!                 │ SampleProvider │ ←── shuffled indices, batch index
//!                 └───────┬────────┘
//!                         │ prefetches batch k+1 on a worker thread
//!                         ↓
//!                   [Materializer] (rayon decode pool, augmentation)
//!                         │
//!                         ↓
//!                    Vec<Sample>
//! ```
//!
//! # Module Structure
//!
//! ```text
//! src/dataloader/
//! ├── mod.rs             # Public API exports + module-level architecture docs
//! ├── config.rs          # LoaderConfig and builder
//! ├── loader.rs          # DataLoader struct and constructors
//! ├── materialize.rs     # Entry index → Sample, chunked over the decode pool
//! ├── provider.rs        # SampleProvider double buffer
//! ├── workers/
//! │   ├── mod.rs         # Worker module declarations
//! │   ├── pool.rs        # Generic `WorkerPool<Task, Output>` implementation
//! │   └── prefetch.rs    # The persistent prefetch worker
//! └── common/
//!     ├── mod.rs         # Module declarations for shared utilities
//!     └── thread.rs      # Thread-local worker ID
//! ```
//!
//! # Example Usage
//!
//! ```ignore
//! let loader = DataLoader::from_samples(samples, LoaderConfig::default())?;
//! let mut provider = loader.make_sample_provider()?;
//!
//! let order: Vec<usize> = (0..loader.num_samples()).collect();
//! let num_batches = order.len().div_ceil(batch_size);
//! for b in 0..num_batches {
//!     let batch = provider.get_batch(&order, batch_size, b)?;
//!     // train on `batch` while batch b+1 is being loaded
//! }
//! ```
//!
//! # Performance Guidelines
//! - Memory: at most two batches are materialized at any time (the one being
//!   trained on and the one being prefetched).
//! - `io_threads = 1` decodes inline on the prefetch thread.

mod common;
mod config;
mod loader;
mod materialize;
mod provider;
mod workers;

// Public re-exports
pub use config::{LoaderConfig, LoaderConfigBuilder, MIN_WORKER_TIMEOUT};
pub use loader::DataLoader;
pub use provider::SampleProvider;
