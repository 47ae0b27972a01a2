//! Batch - ordered group of pending items flushed together

use contracts::{BatchMeta, FlushReason};
use tokio::time::Instant;

use crate::handle::HandleReleaser;

/// An enqueued item together with the release side of its handle
#[derive(Debug)]
pub struct PendingItem<T> {
    item: T,
    releaser: HandleReleaser,
}

impl<T> PendingItem<T> {
    /// Pair an item with its releaser
    pub fn new(item: T, releaser: HandleReleaser) -> Self {
        Self { item, releaser }
    }

    /// Borrow the wrapped item
    pub fn item(&self) -> &T {
        &self.item
    }

    /// When the item was enqueued
    pub fn enqueued_at(&self) -> Instant {
        self.releaser.created_at()
    }

    /// Split into item and releaser
    pub fn into_parts(self) -> (T, HandleReleaser) {
        (self.item, self.releaser)
    }
}

/// A flushed batch, consumed exactly once by the dispatcher
#[derive(Debug)]
pub struct Batch<T> {
    meta: BatchMeta,
    items: Vec<PendingItem<T>>,
}

impl<T> Batch<T> {
    /// Create a batch from pending items in enqueue order
    pub fn new(batch_id: u64, reason: FlushReason, items: Vec<PendingItem<T>>) -> Self {
        Self {
            meta: BatchMeta {
                batch_id,
                size: items.len(),
                reason,
            },
            items,
        }
    }

    /// Batch metadata
    pub fn meta(&self) -> BatchMeta {
        self.meta
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over the wrapped items in enqueue order
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.items.iter().map(PendingItem::item)
    }

    /// Separate the payload handed to the handler from the releasers
    pub fn into_parts(self) -> (BatchMeta, Vec<T>, BatchReleaser) {
        let mut payload = Vec::with_capacity(self.items.len());
        let mut releasers = Vec::with_capacity(self.items.len());
        for pending in self.items {
            let (item, releaser) = pending.into_parts();
            payload.push(item);
            releasers.push(releaser);
        }
        (self.meta, payload, BatchReleaser { releasers })
    }
}

/// Release sides of every handle in one batch
#[derive(Debug)]
pub struct BatchReleaser {
    releasers: Vec<HandleReleaser>,
}

/// Result of releasing a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseSummary {
    /// Handles moved to `Released`
    pub released: usize,
    /// Handles that had already timed out
    pub late: usize,
}

impl BatchReleaser {
    /// Number of handles
    pub fn len(&self) -> usize {
        self.releasers.len()
    }

    /// Whether there are no handles
    pub fn is_empty(&self) -> bool {
        self.releasers.is_empty()
    }

    /// Release every handle in the batch
    pub fn release_all(self) -> ReleaseSummary {
        let mut summary = ReleaseSummary::default();
        for releaser in &self.releasers {
            if releaser.release() {
                summary.released += 1;
            } else {
                summary.late += 1;
            }
        }
        summary
    }
}
