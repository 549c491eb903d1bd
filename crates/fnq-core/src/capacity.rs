//! Memory capacity accounting shared across execution paths
//!
//! The synchronous serving path and the async runner draw from the same
//! process-wide budget. The runner only reads an admission decision; actual
//! reservation and release belong to the execution backend.

use std::sync::atomic::{AtomicU64, Ordering};

/// Default memory footprint assumed per function container.
pub const DEFAULT_TASK_MEMORY: u64 = 128 * 1024 * 1024;

/// Admission predicate consulted before fetching a task.
///
/// Non-blocking, synchronous, and side-effect free - callers must not rely
/// on the answer still holding by the time memory is actually reserved.
pub trait CapacityGate: Send + Sync {
    /// Is there enough free memory to accept one more task right now?
    fn has_available_memory(&self) -> bool;
}

/// Process-wide memory tracker.
///
/// Uses atomic operations for thread-safe access without locks; concurrent
/// reservations never push `used` past `total`.
pub struct MemoryTracker {
    total: u64,
    used: AtomicU64,
    /// Free bytes required before the gate admits another task.
    headroom: u64,
}

impl MemoryTracker {
    /// Create a tracker over a fixed memory budget, admitting while at
    /// least [`DEFAULT_TASK_MEMORY`] is free.
    pub fn new(total: u64) -> Self {
        Self::with_headroom(total, DEFAULT_TASK_MEMORY)
    }

    /// Create a tracker with an explicit admission headroom.
    pub fn with_headroom(total: u64, headroom: u64) -> Self {
        Self {
            total,
            used: AtomicU64::new(0),
            headroom,
        }
    }

    /// Reserve `bytes` against the budget. Returns false (reserving
    /// nothing) when the budget cannot cover the request.
    pub fn reserve(&self, bytes: u64) -> bool {
        let mut used = self.used.load(Ordering::Relaxed);
        loop {
            let Some(next) = used.checked_add(bytes) else {
                return false;
            };
            if next > self.total {
                return false;
            }
            match self.used.compare_exchange_weak(
                used,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => used = actual,
            }
        }
    }

    /// Return `bytes` to the budget.
    pub fn release(&self, bytes: u64) {
        // saturating: a buggy double-release must not wrap the counter
        let mut used = self.used.load(Ordering::Relaxed);
        loop {
            let next = used.saturating_sub(bytes);
            match self.used.compare_exchange_weak(
                used,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => used = actual,
            }
        }
    }

    /// Bytes currently reserved by in-flight executions.
    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Relaxed)
    }

    /// Bytes still available.
    pub fn available(&self) -> u64 {
        self.total - self.used().min(self.total)
    }

    /// The fixed budget.
    pub fn total(&self) -> u64 {
        self.total
    }
}

impl CapacityGate for MemoryTracker {
    fn has_available_memory(&self) -> bool {
        self.available() >= self.headroom
    }
}
