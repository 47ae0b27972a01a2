//! Pending collection - entries accumulated since the last flush.

use std::fmt;

use dispatcher::PendingItem;
use tokio::time::Instant;

/// Ordered entries plus the scheduled inactivity deadline.
///
/// Only ever touched by the collector task, so append, re-arm and clear
/// happen inside one event.
pub struct PendingCollection<T> {
    entries: Vec<PendingItem<T>>,
    batch_size: usize,
    deadline: Option<Instant>,
}

impl<T> fmt::Debug for PendingCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCollection")
            .field("len", &self.entries.len())
            .field("batch_size", &self.batch_size)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl<T> PendingCollection<T> {
    /// Create an empty collection that fills up at `batch_size` entries
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            entries: Vec::with_capacity(batch_size),
            batch_size,
            deadline: None,
        }
    }

    /// Append an entry and push the inactivity deadline forward.
    ///
    /// Returns `true` once the collection holds `batch_size` entries.
    pub fn push(&mut self, entry: PendingItem<T>, deadline: Instant) -> bool {
        self.entries.push(entry);
        self.deadline = Some(deadline);
        self.is_full()
    }

    /// Take every entry in enqueue order, clearing the deadline.
    pub fn take(&mut self) -> Vec<PendingItem<T>> {
        self.deadline = None;
        std::mem::replace(&mut self.entries, Vec::with_capacity(self.batch_size))
    }

    /// Scheduled inactivity deadline, if any entry is pending
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.batch_size
    }
}
