//! BatchCollector - single-owner task that turns enqueued items into batches.

use std::fmt;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use contracts::{BatchError, FlushReason, TimedBatchConfig};
use dispatcher::{handle_pair, Batch, BlockingHandle, PendingItem};

use crate::pending::PendingCollection;

/// Sending side used by callers to hand items to the collector.
pub struct CollectorHandle<T> {
    input_tx: mpsc::UnboundedSender<PendingItem<T>>,
    thread_timeout: Duration,
}

impl<T> Clone for CollectorHandle<T> {
    fn clone(&self) -> Self {
        Self {
            input_tx: self.input_tx.clone(),
            thread_timeout: self.thread_timeout,
        }
    }
}

impl<T> fmt::Debug for CollectorHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorHandle")
            .field("thread_timeout", &self.thread_timeout)
            .field("closed", &self.input_tx.is_closed())
            .finish()
    }
}

impl<T> CollectorHandle<T> {
    /// Enqueue an item and return its handle without waiting.
    ///
    /// The handle's deadline starts now.
    ///
    /// # Errors
    /// `BatchError::Closed` once the collector has shut down.
    pub fn enqueue(&self, item: T) -> Result<BlockingHandle, BatchError> {
        let (handle, releaser) = handle_pair(self.thread_timeout);
        self.input_tx
            .send(PendingItem::new(item, releaser))
            .map_err(|_| BatchError::Closed)?;
        observability::record_item_enqueued();
        Ok(handle)
    }

    /// Whether the collector stopped accepting items
    pub fn is_closed(&self) -> bool {
        self.input_tx.is_closed()
    }
}

/// Totals reported when the collector exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorSummary {
    pub items_collected: u64,
    pub batches_flushed: u64,
}

/// Accumulates items and flushes them on size, inactivity or shutdown.
///
/// Enqueue events and timer firings are both handled by [`BatchCollector::run`],
/// so the pending collection is never observed half-flushed.
pub struct BatchCollector<T> {
    batch_size: usize,
    batch_timeout: Duration,
    input_rx: mpsc::UnboundedReceiver<PendingItem<T>>,
    output_tx: mpsc::UnboundedSender<Batch<T>>,
    shutdown_rx: oneshot::Receiver<()>,
    pending: PendingCollection<T>,
    next_batch_id: u64,
    summary: CollectorSummary,
}

impl<T: Send + 'static> BatchCollector<T> {
    /// Create a collector emitting batches to `output_tx`.
    ///
    /// The collector stops when `shutdown_rx` fires or its sender is dropped.
    pub fn new(
        config: &TimedBatchConfig,
        output_tx: mpsc::UnboundedSender<Batch<T>>,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> (Self, CollectorHandle<T>) {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let collector = Self {
            batch_size: config.batch_size,
            batch_timeout: config.batch_timeout(),
            input_rx,
            output_tx,
            shutdown_rx,
            pending: PendingCollection::new(config.batch_size),
            next_batch_id: 0,
            summary: CollectorSummary::default(),
        };
        let handle = CollectorHandle {
            input_tx,
            thread_timeout: config.thread_timeout(),
        };
        (collector, handle)
    }

    /// Run the collector loop until shutdown.
    #[instrument(
        name = "collector_run",
        skip(self),
        fields(batch_size = self.batch_size, batch_timeout_ms = self.batch_timeout.as_millis() as u64)
    )]
    pub async fn run(mut self) -> CollectorSummary {
        info!("Collector started");

        loop {
            let deadline = self.pending.deadline();

            tokio::select! {
                biased;

                _ = &mut self.shutdown_rx => {
                    debug!(pending = self.pending.len(), "Shutdown requested");
                    break;
                }

                entry = self.input_rx.recv() => match entry {
                    Some(entry) => self.accept(entry),
                    None => {
                        debug!("All enqueuers dropped");
                        break;
                    }
                },

                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.flush(FlushReason::Inactivity);
                }
            }
        }

        // Reject new items, then take whatever was already queued.
        self.input_rx.close();
        while let Some(entry) = self.input_rx.recv().await {
            self.accept(entry);
        }
        self.flush(FlushReason::Shutdown);

        info!(
            items = self.summary.items_collected,
            batches = self.summary.batches_flushed,
            "Collector stopped"
        );
        self.summary
    }

    /// Spawn the collector as a background task
    pub fn spawn(self) -> JoinHandle<CollectorSummary> {
        tokio::spawn(self.run())
    }

    /// Append an item and re-arm the inactivity deadline from its enqueue time.
    fn accept(&mut self, entry: PendingItem<T>) {
        self.summary.items_collected += 1;
        let deadline = entry.enqueued_at() + self.batch_timeout;
        if self.pending.push(entry, deadline) {
            self.flush(FlushReason::Size);
        }
        observability::record_pending_depth(self.pending.len());
    }

    fn flush(&mut self, reason: FlushReason) {
        if self.pending.is_empty() {
            return;
        }

        let entries = self.pending.take();
        self.next_batch_id += 1;
        let batch = Batch::new(self.next_batch_id, reason, entries);
        let meta = batch.meta();

        self.summary.batches_flushed += 1;
        observability::record_batch_flushed(&meta);
        observability::record_pending_depth(0);
        debug!(
            batch_id = meta.batch_id,
            size = meta.size,
            reason = %meta.reason,
            "Batch flushed"
        );

        if self.output_tx.send(batch).is_err() {
            // Releasers are dropped with the batch; its handles will time out.
            warn!(batch_id = meta.batch_id, "Dispatcher channel closed, batch dropped");
        }
    }
}
