//! src/dataloader/common/mod.rs
//!
//! Common utilities shared across the data loader and its workers.

pub mod thread;
