//! # Contracts
//!
//! Frozen interface contracts shared by the timed batching crates.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Timeouts are configured in milliseconds and measured on the tokio monotonic clock
//! - `batch_id` is assigned by the collector and only used for ordering/diagnostics

mod batch;
mod config;
mod error;
mod handler;

pub use batch::*;
pub use config::*;
pub use error::*;
pub use handler::{handler_fn, BatchHandler, FnHandler, LocalBatchHandler};
