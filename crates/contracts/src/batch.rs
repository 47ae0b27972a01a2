//! Batch metadata - Collector output
//!
//! Describes a flushed batch independently of its payload.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a batch was flushed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushReason {
    /// Pending collection reached `batch_size`
    Size,
    /// No item arrived for `batch_timeout_ms`
    Inactivity,
    /// Block was shut down with items still pending
    Shutdown,
}

impl FlushReason {
    /// Stable label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushReason::Size => "size",
            FlushReason::Inactivity => "inactivity",
            FlushReason::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for FlushReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Batch metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMeta {
    /// Batch sequence number (monotonically increasing, starts at 1)
    pub batch_id: u64,

    /// Number of items in the batch
    pub size: usize,

    /// Trigger that produced the batch
    pub reason: FlushReason,
}
