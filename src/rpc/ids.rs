//! Request id allocation.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic request id source shared by every request a client builds.
///
/// Ids start at 1 and are never reused. Allocation is a single atomic
/// `fetch_add`, so concurrent callers can never observe the same id.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Seed the allocator; the first id handed out is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Allocate one id.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocate `count` consecutive ids in one step.
    pub fn next_block(&self, count: u64) -> Range<u64> {
        let first = self.next.fetch_add(count, Ordering::Relaxed);
        first..first + count
    }

    /// The id the next allocation will return.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
