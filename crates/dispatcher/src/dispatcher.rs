//! Dispatcher - main loop that runs the handler against flushed batches

use std::any::Any;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use contracts::{BatchHandler, HandlerError};

use crate::batch::{Batch, ReleaseSummary};
use crate::metrics::DispatchMetrics;

/// Outcome of dispatching one batch
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Handler succeeded and the batch's handles were released
    Handled(ReleaseSummary),
    /// Handler failed; the batch's handles were left to time out
    Failed(HandlerError),
}

impl DispatchOutcome {
    /// Whether the handler succeeded
    pub fn is_handled(&self) -> bool {
        matches!(self, DispatchOutcome::Handled(_))
    }
}

/// The Dispatcher that feeds batches to the handler
///
/// Batches are received in the order the collector flushed them. With
/// `max_in_flight == 1` they are also handled and completed in that order.
pub struct Dispatcher<T, H> {
    handler: Arc<H>,
    input_rx: mpsc::UnboundedReceiver<Batch<T>>,
    metrics: Arc<DispatchMetrics>,
    max_in_flight: usize,
}

impl<T, H> Dispatcher<T, H>
where
    T: Send + 'static,
    H: BatchHandler<T> + Sync + 'static,
{
    /// Create a dispatcher reading batches from `input_rx`
    pub fn new(
        handler: H,
        input_rx: mpsc::UnboundedReceiver<Batch<T>>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            handler: Arc::new(handler),
            input_rx,
            metrics: Arc::new(DispatchMetrics::new()),
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Shared metrics, valid after the dispatcher is spawned
    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run the dispatcher main loop
    ///
    /// Returns when the input channel is closed and every started batch finished.
    #[instrument(name = "dispatcher_run", skip(self), fields(max_in_flight = self.max_in_flight))]
    pub async fn run(mut self) {
        info!(max_in_flight = self.max_in_flight, "Dispatcher started");

        if self.max_in_flight == 1 {
            self.run_sequential().await;
        } else {
            self.run_concurrent().await;
        }

        let snapshot = self.metrics.snapshot();
        info!(
            batches = snapshot.batches_dispatched,
            handled = snapshot.batches_handled,
            failed = snapshot.batches_failed,
            "Dispatcher input closed, shutting down"
        );
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run_sequential(&mut self) {
        while let Some(batch) = self.input_rx.recv().await {
            dispatch(Arc::clone(&self.handler), batch, &self.metrics).await;
        }
    }

    async fn run_concurrent(&mut self) {
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks = JoinSet::new();

        while let Some(batch) = self.input_rx.recv().await {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let handler = Arc::clone(&self.handler);
            let metrics = Arc::clone(&self.metrics);

            tasks.spawn(async move {
                dispatch(handler, batch, &metrics).await;
                drop(permit);
            });

            while let Some(joined) = tasks.try_join_next() {
                log_join_error(joined);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            log_join_error(joined);
        }
    }
}

/// Invoke the handler for one batch and release or abandon its handles.
///
/// The handler runs in its own task so that a panic is contained to the batch.
#[instrument(
    name = "dispatcher_dispatch",
    skip(handler, batch, metrics),
    fields(batch_id = batch.meta().batch_id, size = batch.len(), reason = %batch.meta().reason)
)]
pub async fn dispatch<T, H>(
    handler: Arc<H>,
    batch: Batch<T>,
    metrics: &DispatchMetrics,
) -> DispatchOutcome
where
    T: Send + 'static,
    H: BatchHandler<T> + Sync + 'static,
{
    let (meta, items, releaser) = batch.into_parts();
    metrics.batch_started();
    let started = Instant::now();

    let result = match tokio::spawn(async move { handler.handle(items).await }).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(HandlerError::panicked(panic_message(e.into_panic()))),
        Err(e) => Err(HandlerError::failed(format!("handler task aborted: {e}"))),
    };
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    match result {
        Ok(()) => {
            let summary = releaser.release_all();
            metrics.batch_handled(summary.released, summary.late);
            observability::record_batch_handled(&meta, true, latency_ms);
            observability::record_items_released(summary.released, summary.late);

            if summary.late > 0 {
                warn!(
                    batch_id = meta.batch_id,
                    late = summary.late,
                    "Batch completed after some items already timed out"
                );
            }
            debug!(
                batch_id = meta.batch_id,
                released = summary.released,
                latency_ms,
                "Batch handled"
            );
            DispatchOutcome::Handled(summary)
        }
        Err(e) => {
            metrics.batch_failed(meta.size);
            observability::record_batch_handled(&meta, false, latency_ms);
            error!(
                batch_id = meta.batch_id,
                size = meta.size,
                reason = %meta.reason,
                error = %e,
                "Batch handler failed, handles left to time out"
            );
            // Leave handles pending; each one times out on its own deadline.
            drop(releaser);
            DispatchOutcome::Failed(e)
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn log_join_error(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = ?e, "Dispatch task panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::PendingItem;
    use crate::handle::{handle_pair, BlockingHandle, HandleState};
    use contracts::{handler_fn, FlushReason};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::{sleep, Duration};

    /// Mock handler for testing
    struct MockHandler {
        seen: Arc<Mutex<Vec<Vec<u32>>>>,
        should_fail: bool,
        delay_ms: u64,
    }

    impl BatchHandler<u32> for MockHandler {
        async fn handle(&self, items: Vec<u32>) -> Result<(), HandlerError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.should_fail {
                return Err(HandlerError::failed("mock failure"));
            }
            self.seen.lock().unwrap().push(items);
            Ok(())
        }
    }

    fn make_batch(id: u64, values: &[u32], timeout: Duration) -> (Batch<u32>, Vec<BlockingHandle>) {
        let mut items = Vec::new();
        let mut handles = Vec::new();
        for &v in values {
            let (handle, releaser) = handle_pair(timeout);
            items.push(PendingItem::new(v, releaser));
            handles.push(handle);
        }
        (Batch::new(id, FlushReason::Size, items), handles)
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_success_releases_all() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(MockHandler {
            seen: Arc::clone(&seen),
            should_fail: false,
            delay_ms: 1,
        });
        let metrics = DispatchMetrics::new();
        let (batch, handles) = make_batch(1, &[3, 1, 2], Duration::from_secs(5));

        let outcome = dispatch(handler, batch, &metrics).await;

        assert!(outcome.is_handled());
        assert_eq!(*seen.lock().unwrap(), vec![vec![3, 1, 2]]);
        for handle in handles {
            assert_eq!(handle.state(), HandleState::Released);
            assert!(handle.wait().await.is_ok());
        }
        assert_eq!(metrics.snapshot().items_released, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_failure_leaves_handles_to_time_out() {
        let handler = Arc::new(MockHandler {
            seen: Arc::new(Mutex::new(Vec::new())),
            should_fail: true,
            delay_ms: 0,
        });
        let metrics = DispatchMetrics::new();
        let (batch, handles) = make_batch(1, &[1, 2], Duration::from_millis(300));

        let outcome = dispatch(handler, batch, &metrics).await;
        assert!(matches!(outcome, DispatchOutcome::Failed(_)));
        assert_eq!(metrics.batches_failed(), 1);

        let start = Instant::now();
        for handle in handles {
            assert_eq!(handle.state(), HandleState::Pending);
            assert!(handle.wait().await.unwrap_err().is_timeout());
        }
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_dispatch_contains_handler_panic() {
        let handler = Arc::new(handler_fn(|items: Vec<u32>| async move {
            if !items.is_empty() {
                panic!("handler exploded");
            }
            Ok(())
        }));
        let metrics = DispatchMetrics::new();
        let (batch, handles) = make_batch(9, &[1], Duration::from_millis(50));

        let outcome = dispatch(handler, batch, &metrics).await;
        match outcome {
            DispatchOutcome::Failed(HandlerError::Panicked { message }) => {
                assert!(message.contains("handler exploded"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(handles[0].state(), HandleState::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatcher_sequential_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = MockHandler {
            seen: Arc::clone(&seen),
            should_fail: false,
            delay_ms: 5,
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(handler, rx, 1);
        let metrics = dispatcher.metrics();
        let worker = dispatcher.spawn();

        let mut all_handles = Vec::new();
        for id in 1..=4u64 {
            let values: Vec<u32> = (0..3).map(|i| id as u32 * 10 + i).collect();
            let (batch, handles) = make_batch(id, &values, Duration::from_secs(5));
            tx.send(batch).unwrap();
            all_handles.extend(handles);
        }
        drop(tx);
        worker.await.unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], vec![10, 11, 12]);
        assert_eq!(seen[3], vec![40, 41, 42]);
        assert_eq!(metrics.batches_handled(), 4);
        assert!(all_handles
            .iter()
            .all(|h| h.state() == HandleState::Released));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatcher_bounded_concurrency() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (running_c, peak_c) = (Arc::clone(&running), Arc::clone(&peak));
        let handler = handler_fn(move |_items: Vec<u32>| {
            let running = Arc::clone(&running_c);
            let peak = Arc::clone(&peak_c);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(handler, rx, 3);
        let metrics = dispatcher.metrics();
        let worker = dispatcher.spawn();

        for id in 1..=10u64 {
            let (batch, _handles) = make_batch(id, &[id as u32], Duration::from_secs(5));
            tx.send(batch).unwrap();
        }
        drop(tx);
        worker.await.unwrap();

        assert_eq!(metrics.batches_handled(), 10);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }
}
