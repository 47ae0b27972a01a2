//! # Timed Batch
//!
//! 定时批处理块：调用方并发入队，条目按数量或不活跃超时成批交给处理器，
//! 每个调用方在批次处理成功后被释放，或在自己的超时到期后得到超时错误。
//!
//! ## 使用示例
//!
//! ```ignore
//! use timed_batch::{handler_fn, TimedBatchBuilder, TimedBatchConfig};
//!
//! let config = TimedBatchConfig::new(10, 2000, 22000)?;
//! let block = TimedBatchBuilder::new(config)?.set_handler(handler_fn(|rows: Vec<Row>| async move {
//!     store.insert_all(rows).await.map_err(|e| HandlerError::with_source("insert", e))
//! }));
//!
//! // 每个调用方等待自己的条目所在批次完成
//! block.enqueue(row).await?;
//!
//! block.shutdown().await;
//! ```

mod block;

pub use block::{BatchEnqueuer, TimedBatchBlock, TimedBatchBuilder};
pub use contracts::{
    handler_fn, BatchError, BatchHandler, BatchMeta, ContractError, FlushReason, HandlerError,
    TimedBatchConfig,
};
pub use dispatcher::{BlockingHandle, DispatchSnapshot, HandleState};
