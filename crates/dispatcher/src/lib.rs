//! # Dispatcher
//!
//! 批次分发模块。
//!
//! 负责：
//! - 消费收集器刷出的 `Batch`
//! - 对每个批次调用 handler，默认串行
//! - 成功时释放批次内全部句柄，失败时留待其超时
//! - 隔离失败或 panic 的 handler，不影响后续批次

pub mod batch;
pub mod dispatcher;
pub mod handle;
pub mod metrics;

pub use batch::{Batch, BatchReleaser, PendingItem, ReleaseSummary};
pub use contracts::{BatchHandler, BatchMeta, FlushReason, HandlerError};
pub use dispatcher::{dispatch, DispatchOutcome, Dispatcher};
pub use handle::{handle_pair, BlockingHandle, HandleReleaser, HandleState};
pub use metrics::{DispatchMetrics, DispatchSnapshot};
