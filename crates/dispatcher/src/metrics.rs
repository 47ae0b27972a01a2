//! Dispatch metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters shared between the dispatcher worker and the block owner
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Items accepted by the block
    items_enqueued: AtomicU64,
    /// Batches currently being handled
    in_flight: AtomicUsize,
    /// Batches received from the collector
    batches_dispatched: AtomicU64,
    /// Batches whose handler returned `Ok`
    batches_handled: AtomicU64,
    /// Batches whose handler failed or panicked
    batches_failed: AtomicU64,
    /// Handles moved to `Released`
    items_released: AtomicU64,
    /// Handles that had already timed out when their batch succeeded
    items_released_late: AtomicU64,
    /// Items left unreleased because their batch failed
    items_failed: AtomicU64,
    /// Failed batches since the last successful one
    consecutive_failures: AtomicU64,
}

impl DispatchMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get batches currently in flight
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Count an accepted item
    pub fn item_enqueued(&self) {
        self.items_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark a batch as started
    pub fn batch_started(&self) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful batch
    pub fn batch_handled(&self, released: usize, late: usize) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.batches_handled.fetch_add(1, Ordering::Relaxed);
        self.items_released
            .fetch_add(released as u64, Ordering::Relaxed);
        self.items_released_late
            .fetch_add(late as u64, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    /// Record a failed batch
    pub fn batch_failed(&self, size: usize) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.items_failed.fetch_add(size as u64, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get batches handled successfully
    pub fn batches_handled(&self) -> u64 {
        self.batches_handled.load(Ordering::Relaxed)
    }

    /// Get failed batches
    pub fn batches_failed(&self) -> u64 {
        self.batches_failed.load(Ordering::Relaxed)
    }

    /// Get failed batches since the last success
    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            items_enqueued: self.items_enqueued.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            batches_handled: self.batches_handled(),
            batches_failed: self.batches_failed(),
            items_released: self.items_released.load(Ordering::Relaxed),
            items_released_late: self.items_released_late.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures(),
        }
    }
}

/// Snapshot of dispatch metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub items_enqueued: u64,
    pub in_flight: usize,
    pub batches_dispatched: u64,
    pub batches_handled: u64,
    pub batches_failed: u64,
    pub items_released: u64,
    pub items_released_late: u64,
    pub items_failed: u64,
    pub consecutive_failures: u64,
}
