//! # Collector
//!
//! 定时批处理收集器。
//!
//! 负责：
//! - 接收入队条目并创建 `BlockingHandle`
//! - 防抖的不活跃定时器（每次入队重新计时）
//! - 达到 batch_size 时立即刷新
//! - 关闭时刷新剩余条目，并关闭输出通道
//!
//! ## 使用示例
//!
//! ```ignore
//! use collector::BatchCollector;
//!
//! let (batch_tx, batch_rx) = tokio::sync::mpsc::unbounded_channel();
//! let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
//! let (collector, input) = BatchCollector::new(&config, batch_tx, shutdown_rx);
//! let task = collector.spawn();
//!
//! let handle = input.enqueue(item)?;
//! handle.wait().await?;
//! ```

mod collector;
mod pending;

pub use collector::{BatchCollector, CollectorHandle, CollectorSummary};
pub use pending::PendingCollection;
