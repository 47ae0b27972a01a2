//! TimedBatchBlock - wires the collector to the dispatcher behind one handle.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use collector::{BatchCollector, CollectorHandle, CollectorSummary};
use contracts::{BatchError, BatchHandler, ContractError, TimedBatchConfig};
use dispatcher::{BlockingHandle, DispatchMetrics, DispatchSnapshot, Dispatcher};

/// Validated configuration waiting for its handler.
///
/// A block only comes into existence through [`TimedBatchBuilder::set_handler`],
/// so nothing can be enqueued before a handler is attached.
pub struct TimedBatchBuilder<T> {
    config: TimedBatchConfig,
    _items: PhantomData<fn(T)>,
}

impl<T> fmt::Debug for TimedBatchBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedBatchBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl<T: Send + 'static> TimedBatchBuilder<T> {
    /// Validate `config` and start building a block.
    ///
    /// # Errors
    /// `ContractError::ConfigValidation` if a field is zero or the thread
    /// timeout does not exceed the batch timeout.
    pub fn new(config: TimedBatchConfig) -> Result<Self, ContractError> {
        config.ensure_valid()?;
        Ok(Self {
            config,
            _items: PhantomData,
        })
    }

    pub fn config(&self) -> &TimedBatchConfig {
        &self.config
    }

    /// Attach the handler and start the collector and dispatcher tasks.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    #[instrument(
        name = "timed_batch_start",
        skip_all,
        fields(
            batch_size = self.config.batch_size,
            batch_timeout_ms = self.config.batch_timeout_ms,
            thread_timeout_ms = self.config.thread_timeout_ms
        )
    )]
    pub fn set_handler<H>(self, handler: H) -> TimedBatchBlock<T>
    where
        H: BatchHandler<T> + Sync + 'static,
    {
        let (batch_tx, batch_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let dispatcher = Dispatcher::new(handler, batch_rx, self.config.max_in_flight_batches);
        let metrics = dispatcher.metrics();
        let dispatcher_task = dispatcher.spawn();

        let (collector, input) = BatchCollector::new(&self.config, batch_tx, shutdown_rx);
        let collector_task = collector.spawn();

        info!(
            max_in_flight = self.config.max_in_flight_batches,
            "Timed batch block started"
        );

        TimedBatchBlock {
            enqueuer: BatchEnqueuer { input, metrics },
            config: self.config,
            shutdown_tx,
            collector_task,
            dispatcher_task,
        }
    }
}

/// Cloneable enqueue side of a block, for sharing among unrelated call sites.
pub struct BatchEnqueuer<T> {
    input: CollectorHandle<T>,
    metrics: Arc<DispatchMetrics>,
}

impl<T> Clone for BatchEnqueuer<T> {
    fn clone(&self) -> Self {
        Self {
            input: self.input.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<T> fmt::Debug for BatchEnqueuer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchEnqueuer")
            .field("closed", &self.input.is_closed())
            .finish()
    }
}

impl<T> BatchEnqueuer<T> {
    /// Enqueue `item` and return its handle without waiting.
    ///
    /// # Errors
    /// `BatchError::Closed` after the block has shut down.
    pub fn submit(&self, item: T) -> Result<BlockingHandle, BatchError> {
        let handle = self.input.enqueue(item)?;
        self.metrics.item_enqueued();
        Ok(handle)
    }

    /// Enqueue `item` and wait until its batch is handled.
    ///
    /// # Errors
    /// - `BatchError::Timeout` if the batch did not complete successfully
    ///   within the thread timeout
    /// - `BatchError::Closed` after the block has shut down
    pub async fn enqueue(&self, item: T) -> Result<(), BatchError> {
        let started = Instant::now();
        let handle = self.submit(item)?;
        let result = handle.wait().await;

        let waited_ms = started.elapsed().as_secs_f64() * 1000.0;
        observability::record_item_outcome(result.is_ok(), waited_ms);
        if let Err(e) = &result {
            warn!(error = %e, "Item timed out waiting for batch completion");
        }
        result
    }

    /// Whether the block stopped accepting items
    pub fn is_closed(&self) -> bool {
        self.input.is_closed()
    }

    /// Snapshot of dispatch counters
    pub fn metrics(&self) -> DispatchSnapshot {
        self.metrics.snapshot()
    }
}

/// A running batching block: owns the collector and dispatcher tasks.
///
/// Dropping the block without calling [`TimedBatchBlock::shutdown`] still
/// stops the collector, but pending work is not awaited.
pub struct TimedBatchBlock<T> {
    enqueuer: BatchEnqueuer<T>,
    config: TimedBatchConfig,
    shutdown_tx: oneshot::Sender<()>,
    collector_task: JoinHandle<CollectorSummary>,
    dispatcher_task: JoinHandle<()>,
}

impl<T> fmt::Debug for TimedBatchBlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedBatchBlock")
            .field("config", &self.config)
            .field("metrics", &self.enqueuer.metrics())
            .finish()
    }
}

impl<T> TimedBatchBlock<T> {
    /// See [`BatchEnqueuer::submit`]
    pub fn submit(&self, item: T) -> Result<BlockingHandle, BatchError> {
        self.enqueuer.submit(item)
    }

    /// See [`BatchEnqueuer::enqueue`]
    pub async fn enqueue(&self, item: T) -> Result<(), BatchError> {
        self.enqueuer.enqueue(item).await
    }

    /// New handle sharing this block
    pub fn enqueuer(&self) -> BatchEnqueuer<T> {
        self.enqueuer.clone()
    }

    pub fn config(&self) -> &TimedBatchConfig {
        &self.config
    }

    /// Snapshot of dispatch counters
    pub fn metrics(&self) -> DispatchSnapshot {
        self.enqueuer.metrics()
    }

    /// Flush pending items, wait for every started batch, and stop.
    ///
    /// Items submitted afterwards through any [`BatchEnqueuer`] fail with
    /// `BatchError::Closed`.
    #[instrument(name = "timed_batch_shutdown", skip(self))]
    pub async fn shutdown(self) -> DispatchSnapshot {
        // The collector also stops if the receiver is already gone.
        let _ = self.shutdown_tx.send(());

        match self.collector_task.await {
            Ok(summary) => info!(
                items = summary.items_collected,
                batches = summary.batches_flushed,
                "Collector drained"
            ),
            Err(e) => error!(error = %e, "Collector task failed"),
        }

        if let Err(e) = self.dispatcher_task.await {
            error!(error = %e, "Dispatcher task failed");
        }

        let snapshot = self.enqueuer.metrics();
        info!(
            handled = snapshot.batches_handled,
            failed = snapshot.batches_failed,
            released = snapshot.items_released,
            "Timed batch block stopped"
        );
        snapshot
    }
}
