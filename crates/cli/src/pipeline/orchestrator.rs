//! Workload orchestrator - drives concurrent callers through one batch block.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use timed_batch::{BatchError, BatchHandler, HandlerError, TimedBatchBuilder, TimedBatchConfig};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use observability::BatchMetricsAggregator;

use super::PipelineStats;

/// Synthetic record submitted by one caller
#[derive(Debug, Clone)]
pub struct Record {
    pub id: u64,
    pub submitted_at: Instant,
}

/// Workload configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Batch block configuration
    pub batch: TimedBatchConfig,

    /// Number of records to submit
    pub items: u64,

    /// Delay between two submissions
    pub spacing: Duration,

    /// Simulated handler latency per batch
    pub handler_latency: Duration,

    /// Probability that a batch fails
    pub failure_rate: f64,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Handler standing in for a downstream store
struct SyntheticStore {
    latency: Duration,
    failure_rate: f64,
    aggregator: Arc<Mutex<BatchMetricsAggregator>>,
}

impl BatchHandler<Record> for SyntheticStore {
    async fn handle(&self, records: Vec<Record>) -> Result<(), HandlerError> {
        let started = Instant::now();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failed = self.failure_rate > 0.0 && rand::rng().random_bool(self.failure_rate);
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        if let Ok(mut aggregator) = self.aggregator.lock() {
            aggregator.update(records.len(), !failed, latency_ms);
        }

        if let Some(first) = records.first() {
            debug!(
                first_record = first.id,
                size = records.len(),
                oldest_wait_ms = first.submitted_at.elapsed().as_millis() as u64,
                failed,
                "Synthetic store write"
            );
        }

        if failed {
            Err(HandlerError::failed(format!(
                "simulated write failure for {} records",
                records.len()
            )))
        } else {
            Ok(())
        }
    }
}

/// Main workload orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Submit every record and wait for all callers to finish
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let aggregator = Arc::new(Mutex::new(BatchMetricsAggregator::new(
            self.config.batch.batch_size,
        )));
        let store = SyntheticStore {
            latency: self.config.handler_latency,
            failure_rate: self.config.failure_rate,
            aggregator: Arc::clone(&aggregator),
        };

        let block = TimedBatchBuilder::new(self.config.batch.clone())
            .context("Invalid batch configuration")?
            .set_handler(store);

        info!(
            items = self.config.items,
            spacing_ms = self.config.spacing.as_millis() as u64,
            "Submitting records"
        );

        let mut callers = JoinSet::new();
        for id in 0..self.config.items {
            let enqueuer = block.enqueuer();
            callers.spawn(async move {
                let record = Record {
                    id,
                    submitted_at: Instant::now(),
                };
                let started = Instant::now();
                let result = enqueuer.enqueue(record).await;
                (id, result, started.elapsed())
            });

            if !self.config.spacing.is_zero() {
                tokio::time::sleep(self.config.spacing).await;
            }
        }

        let mut stats = PipelineStats::default();
        while let Some(joined) = callers.join_next().await {
            match joined {
                Ok((_, Ok(()), waited)) => stats.record_success(waited),
                Ok((id, Err(BatchError::Timeout { waited_ms }), _)) => {
                    debug!(record = id, waited_ms, "Record timed out");
                    stats.record_timeout();
                }
                Ok((id, Err(BatchError::Closed), _)) => {
                    warn!(record = id, "Block closed before record was accepted");
                    stats.rejected += 1;
                }
                Err(e) => warn!(error = %e, "Caller task failed"),
            }
        }

        stats.dispatch = block.shutdown().await;
        stats.duration = start_time.elapsed();
        if let Ok(guard) = aggregator.lock() {
            stats.batch_metrics = guard.clone();
        }

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            throughput = format!("{:.2}", stats.throughput()),
            "Workload complete"
        );

        Ok(stats)
    }
}
