//! Thread-local storage for worker identification.
//!
//! Provides a thread-local worker ID that allows workers to identify themselves
//! in log records and error messages.

use std::cell::RefCell;

thread_local! {
    /// Thread-local worker ID.
    ///
    /// Each worker thread is assigned a unique ID (0 to num_workers-1) when spawned.
    pub static WORKER_ID: RefCell<usize> = const { RefCell::new(0) };
}

/// ID of the calling worker thread (`0` outside a worker pool).
pub fn current_worker_id() -> usize {
    WORKER_ID.with(|id| *id.borrow())
}
