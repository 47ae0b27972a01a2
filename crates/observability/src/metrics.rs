//! 批处理指标收集模块
//!
//! 基于 BatchMeta 收集和统计批次刷新、处理与调用方超时的运行指标。

use contracts::BatchMeta;
use metrics::{counter, gauge, histogram};

/// 记录入队
pub fn record_item_enqueued() {
    counter!("timed_batch_items_enqueued_total").increment(1);
}

/// 记录待处理集合深度
pub fn record_pending_depth(depth: usize) {
    gauge!("timed_batch_pending_items").set(depth as f64);
}

/// 记录批次刷新
///
/// 每次 collector 产生 Batch 时调用。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_batch_flushed;
///
/// let batch = Batch::new(next_id, FlushReason::Size, pending);
/// record_batch_flushed(&batch.meta());
/// ```
pub fn record_batch_flushed(meta: &BatchMeta) {
    counter!(
        "timed_batch_batches_flushed_total",
        "reason" => meta.reason.as_str()
    )
    .increment(1);

    histogram!("timed_batch_batch_size").record(meta.size as f64);

    // 批次 ID (用于检测重复/跳号)
    gauge!("timed_batch_last_batch_id").set(meta.batch_id as f64);
}

/// 记录批次处理结果与耗时
pub fn record_batch_handled(meta: &BatchMeta, success: bool, latency_ms: f64) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "timed_batch_batches_handled_total",
        "status" => status,
        "reason" => meta.reason.as_str()
    )
    .increment(1);

    histogram!("timed_batch_handler_latency_ms", "status" => status).record(latency_ms);

    if !success {
        counter!("timed_batch_items_unreleased_total").increment(meta.size as u64);
    }
}

/// 记录释放的句柄数 (late = 释放时已超时)
pub fn record_items_released(released: usize, late: usize) {
    counter!("timed_batch_items_released_total").increment(released as u64);
    if late > 0 {
        counter!("timed_batch_items_released_late_total").increment(late as u64);
    }
}

/// 记录调用方观察到的结果
pub fn record_item_outcome(success: bool, waited_ms: f64) {
    let status = if success { "success" } else { "timeout" };
    counter!("timed_batch_item_outcomes_total", "status" => status).increment(1);
    histogram!("timed_batch_item_wait_ms", "status" => status).record(waited_ms);
}

/// 批处理指标聚合器
///
/// 在内存中聚合处理器侧观察到的批次，便于统计和输出摘要。
/// 满批 (= batch_size) 与未满批分开计数。
#[derive(Debug, Clone, Default)]
pub struct BatchMetricsAggregator {
    /// 配置的批大小
    pub batch_size: usize,

    /// 总批次数
    pub total_batches: u64,

    /// 处理失败批次数
    pub failed_batches: u64,

    /// 总条目数
    pub total_items: u64,

    /// 满批 / 未满批计数
    pub full_batches: u64,
    pub partial_batches: u64,

    /// 批大小统计
    pub size_stats: RunningStats,

    /// 处理耗时统计 (毫秒)
    pub latency_stats: RunningStats,
}

impl BatchMetricsAggregator {
    /// 创建新的聚合器
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }

    /// 更新聚合统计
    pub fn update(&mut self, size: usize, success: bool, latency_ms: f64) {
        self.total_batches += 1;
        self.total_items += size as u64;
        if !success {
            self.failed_batches += 1;
        }

        if size >= self.batch_size {
            self.full_batches += 1;
        } else {
            self.partial_batches += 1;
        }

        self.size_stats.push(size as f64);
        self.latency_stats.push(latency_ms);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_batches: self.total_batches,
            failed_batches: self.failed_batches,
            total_items: self.total_items,
            full_batches: self.full_batches,
            partial_batches: self.partial_batches,
            failure_rate: if self.total_batches > 0 {
                self.failed_batches as f64 / self.total_batches as f64 * 100.0
            } else {
                0.0
            },
            batch_size: StatsSummary::from(&self.size_stats),
            latency_ms: StatsSummary::from(&self.latency_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::new(self.batch_size);
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_batches: u64,
    pub failed_batches: u64,
    pub total_items: u64,
    pub full_batches: u64,
    pub partial_batches: u64,
    pub failure_rate: f64,
    pub batch_size: StatsSummary,
    pub latency_ms: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Batch Metrics Summary ===")?;
        writeln!(f, "Total batches: {}", self.total_batches)?;
        writeln!(f, "Total items: {}", self.total_items)?;
        writeln!(
            f,
            "Failed batches: {} ({:.2}%)",
            self.failed_batches, self.failure_rate
        )?;
        writeln!(
            f,
            "Full batches: {}, partial batches: {}",
            self.full_batches, self.partial_batches
        )?;
        writeln!(f, "Batch size: {}", self.batch_size)?;
        writeln!(f, "Handler latency (ms): {}", self.latency_ms)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}
