//! Timed batch configuration contracts that can be shared across crates.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ContractError;

/// Thresholds governing batch size and the two timeouts.
///
/// `thread_timeout_ms` must be strictly larger than `batch_timeout_ms`,
/// otherwise an item could expire before any batch had a chance to trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TimedBatchConfig {
    /// Number of items that triggers an immediate flush
    #[validate(range(min = 1))]
    pub batch_size: usize,

    /// Inactivity window in milliseconds after the last enqueue
    #[validate(range(min = 1))]
    pub batch_timeout_ms: u64,

    /// Per-item deadline in milliseconds, measured from enqueue
    #[validate(range(min = 1))]
    pub thread_timeout_ms: u64,

    /// Handler invocations allowed to run at the same time
    #[serde(default = "default_max_in_flight_batches")]
    #[validate(range(min = 1))]
    pub max_in_flight_batches: usize,
}

fn default_max_in_flight_batches() -> usize {
    1
}

impl Default for TimedBatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_timeout_ms: 2000,
            thread_timeout_ms: 22000,
            max_in_flight_batches: default_max_in_flight_batches(),
        }
    }
}

impl TimedBatchConfig {
    /// Build a validated configuration with sequential dispatch.
    ///
    /// # Errors
    /// Returns `ConfigValidation` when any value is zero or when
    /// `thread_timeout_ms <= batch_timeout_ms`.
    pub fn new(
        batch_size: usize,
        batch_timeout_ms: u64,
        thread_timeout_ms: u64,
    ) -> Result<Self, ContractError> {
        let config = Self {
            batch_size,
            batch_timeout_ms,
            thread_timeout_ms,
            max_in_flight_batches: default_max_in_flight_batches(),
        };
        config.ensure_valid()?;
        Ok(config)
    }

    /// Allow up to `n` batches to be handled concurrently.
    ///
    /// # Errors
    /// Returns `ConfigValidation` when `n` is zero.
    pub fn with_max_in_flight_batches(mut self, n: usize) -> Result<Self, ContractError> {
        self.max_in_flight_batches = n;
        self.ensure_valid()?;
        Ok(self)
    }

    /// Thread timeout that leaves room for a full batch of slow arrivals:
    /// `batch_size * batch_timeout_ms + batch_timeout_ms`.
    pub fn recommended_thread_timeout(batch_size: usize, batch_timeout_ms: u64) -> u64 {
        (batch_size as u64)
            .saturating_mul(batch_timeout_ms)
            .saturating_add(batch_timeout_ms)
    }

    /// Check field ranges and the timeout relationship.
    pub fn ensure_valid(&self) -> Result<(), ContractError> {
        if let Err(errors) = Validate::validate(self) {
            let mut fields: Vec<String> = errors
                .field_errors()
                .keys()
                .map(|field| field.to_string())
                .collect();
            fields.sort();
            return Err(ContractError::config_validation(
                fields.join(", "),
                "value must be > 0",
            ));
        }

        if self.thread_timeout_ms <= self.batch_timeout_ms {
            return Err(ContractError::config_validation(
                "thread_timeout_ms",
                format!(
                    "thread timeout ({}ms) must be greater than batch timeout ({}ms)",
                    self.thread_timeout_ms, self.batch_timeout_ms
                ),
            ));
        }

        Ok(())
    }

    /// Inactivity window as a `Duration`
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    /// Per-item deadline as a `Duration`
    pub fn thread_timeout(&self) -> Duration {
        Duration::from_millis(self.thread_timeout_ms)
    }
}
