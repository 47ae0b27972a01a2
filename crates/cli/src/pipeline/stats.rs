//! Workload statistics and metrics.

use std::time::Duration;

use observability::{BatchMetricsAggregator, RunningStats, StatsSummary};
use timed_batch::DispatchSnapshot;

/// Statistics from a workload run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Records whose batch was handled in time
    pub succeeded: u64,

    /// Records that hit their thread timeout
    pub timed_out: u64,

    /// Records rejected because the block was closed
    pub rejected: u64,

    /// Caller-observed wait for successful records (ms)
    pub wait_ms: RunningStats,

    /// Total duration of the run
    pub duration: Duration,

    /// Final dispatcher counters
    pub dispatch: DispatchSnapshot,

    /// Handler-side batch statistics
    pub batch_metrics: BatchMetricsAggregator,
}

impl PipelineStats {
    pub fn record_success(&mut self, waited: Duration) {
        self.succeeded += 1;
        self.wait_ms.push(waited.as_secs_f64() * 1000.0);
    }

    pub fn record_timeout(&mut self) {
        self.timed_out += 1;
    }

    /// Records completed successfully per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.succeeded as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Timed out records as percentage of all finished records
    pub fn timeout_rate(&self) -> f64 {
        let total = self.succeeded + self.timed_out;
        if total > 0 {
            (self.timed_out as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Workload Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Succeeded: {}", self.succeeded);
        println!(
            "   ├─ Timed out: {} ({:.2}%)",
            self.timed_out,
            self.timeout_rate()
        );
        println!("   ├─ Rejected: {}", self.rejected);
        println!("   ├─ Throughput: {:.2} records/s", self.throughput());
        println!("   └─ Wait (ms): {}", StatsSummary::from(&self.wait_ms));

        println!("\n📦 Dispatcher");
        println!("   ├─ Batches dispatched: {}", self.dispatch.batches_dispatched);
        println!("   ├─ Batches handled: {}", self.dispatch.batches_handled);
        println!("   ├─ Batches failed: {}", self.dispatch.batches_failed);
        println!("   ├─ Items released: {}", self.dispatch.items_released);
        println!(
            "   └─ Items released after timeout: {}",
            self.dispatch.items_released_late
        );

        let summary = self.batch_metrics.summary();

        println!("\n📈 Handler");
        println!(
            "   ├─ Full / partial batches: {} / {}",
            summary.full_batches, summary.partial_batches
        );
        println!("   ├─ Batch size: {}", summary.batch_size);
        println!("   └─ Latency (ms): {}", summary.latency_ms);

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let mut stats = PipelineStats {
            duration: Duration::from_secs(2),
            ..Default::default()
        };
        for _ in 0..9 {
            stats.record_success(Duration::from_millis(10));
        }
        stats.record_timeout();

        assert!((stats.throughput() - 4.5).abs() < 1e-10);
        assert!((stats.timeout_rate() - 10.0).abs() < 1e-10);
        assert_eq!(stats.wait_ms.count(), 9);
    }

    #[test]
    fn test_empty_run() {
        let stats = PipelineStats::default();
        assert_eq!(stats.throughput(), 0.0);
        assert_eq!(stats.timeout_rate(), 0.0);
    }
}
