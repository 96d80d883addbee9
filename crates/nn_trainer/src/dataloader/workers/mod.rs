//! Worker management for background data loading.
//!
//! - `pool`: Generic worker pool implementation
//! - `prefetch`: The persistent worker that materializes the next batch

pub(crate) mod pool;
pub(crate) mod prefetch;
