//! BlockingHandle - per-item completion signal with its own deadline
//!
//! A handle is split in two halves created together at enqueue time:
//! - [`BlockingHandle`] stays with the caller and is awaited
//! - [`HandleReleaser`] travels with the item through the collector and dispatcher
//!
//! The outcome is decided by a single compare-and-swap on the shared state,
//! so exactly one of released / timed out is ever observed.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use contracts::BatchError;

const PENDING: u8 = 0;
const RELEASED: u8 = 1;
const TIMED_OUT: u8 = 2;

/// Lifecycle of a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Waiting for its batch to complete
    Pending,
    /// Batch completed successfully (terminal)
    Released,
    /// Deadline elapsed before release (terminal)
    TimedOut,
}

impl HandleState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            RELEASED => HandleState::Released,
            TIMED_OUT => HandleState::TimedOut,
            _ => HandleState::Pending,
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    notify: Notify,
    created_at: Instant,
    deadline: Instant,
}

impl Shared {
    fn state(&self) -> HandleState {
        HandleState::from_raw(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Create a handle pair whose deadline is `thread_timeout` from now
pub fn handle_pair(thread_timeout: Duration) -> (BlockingHandle, HandleReleaser) {
    let created_at = Instant::now();
    let deadline = created_at + thread_timeout;
    let shared = Arc::new(Shared {
        state: AtomicU8::new(PENDING),
        notify: Notify::new(),
        created_at,
        deadline,
    });

    let handle = BlockingHandle {
        shared: Arc::clone(&shared),
        created_at,
        deadline,
        timeout: thread_timeout,
    };
    (handle, HandleReleaser { shared })
}

/// Caller side of a handle
pub struct BlockingHandle {
    shared: Arc<Shared>,
    created_at: Instant,
    deadline: Instant,
    timeout: Duration,
}

impl BlockingHandle {
    /// Current state
    pub fn state(&self) -> HandleState {
        self.shared.state()
    }

    /// Instant at which the handle times out
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline (zero once elapsed)
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Time since the item was enqueued
    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Wait until the batch containing this item completes or the deadline elapses.
    ///
    /// # Errors
    /// Returns `BatchError::Timeout` if the handle was not released in time.
    pub async fn wait(self) -> Result<(), BatchError> {
        loop {
            match self.shared.state() {
                HandleState::Released => return Ok(()),
                HandleState::TimedOut => return Err(self.timeout_error()),
                HandleState::Pending => {}
            }

            tokio::select! {
                _ = self.shared.notify.notified() => {
                    // re-check state on the next iteration
                }
                _ = tokio::time::sleep_until(self.deadline) => {
                    if self.shared.transition(TIMED_OUT) {
                        return Err(self.timeout_error());
                    }
                    // lost the race against release
                }
            }
        }
    }

    fn timeout_error(&self) -> BatchError {
        BatchError::Timeout {
            waited_ms: self.timeout.as_millis() as u64,
        }
    }
}

impl fmt::Debug for BlockingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingHandle")
            .field("state", &self.state())
            .field("remaining", &self.remaining())
            .finish()
    }
}

/// Dispatcher side of a handle
pub struct HandleReleaser {
    shared: Arc<Shared>,
}

impl HandleReleaser {
    /// Release the waiting caller.
    ///
    /// Returns `true` if this call moved the handle to `Released`. Releasing an
    /// already released or timed out handle is a no-op returning `false`.
    /// A release arriving after the deadline settles the handle as timed out.
    pub fn release(&self) -> bool {
        let target = if Instant::now() >= self.shared.deadline {
            TIMED_OUT
        } else {
            RELEASED
        };
        let moved = self.shared.transition(target);
        if moved {
            self.shared.notify.notify_one();
        }
        moved && target == RELEASED
    }

    /// Instant the handle pair was created, i.e. when the item was enqueued
    pub fn created_at(&self) -> Instant {
        self.shared.created_at
    }

    /// Current state
    pub fn state(&self) -> HandleState {
        self.shared.state()
    }
}

impl fmt::Debug for HandleReleaser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleReleaser")
            .field("state", &self.state())
            .finish()
    }
}
