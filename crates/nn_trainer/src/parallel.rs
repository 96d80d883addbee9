//! Helpers shared by the decode pool and the gradient workers.

use std::ops::Range;
use std::thread;

/// Resolves a configured thread count: `0` means the machine's available
/// parallelism (falling back to 1 when it cannot be queried).
pub fn resolve_thread_count(configured: usize) -> usize {
    if configured > 0 {
        return configured;
    }
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Splits `0..count` into `num_chunks` contiguous ranges; the first
/// `count % num_chunks` ranges get one extra element, so sizes differ by at
/// most one.
pub fn chunk_ranges(count: usize, num_chunks: usize) -> Vec<Range<usize>> {
    if num_chunks == 0 {
        return Vec::new();
    }
    let base = count / num_chunks;
    let remainder = count % num_chunks;

    let mut ranges = Vec::with_capacity(num_chunks);
    let mut start = 0;
    for i in 0..num_chunks {
        let len = base + usize::from(i < remainder);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}
