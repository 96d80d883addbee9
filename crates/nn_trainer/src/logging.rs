//! src/logging.rs
//!
//! Subscriber setup for binaries and tests. Library code only emits events.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Installs a global `fmt` subscriber filtered by `NN_TRAINER_LOG`, then
/// `RUST_LOG`, then `info`.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("NN_TRAINER_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
