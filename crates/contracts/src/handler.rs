//! BatchHandler trait - Dispatcher output interface
//!
//! Defines the abstract interface for the downstream batch effect.

use std::future::Future;

use crate::HandlerError;

/// Batch processing trait
///
/// Receives the items of one batch in enqueue order. Returning `Ok` means every
/// item is considered durably handled; returning `Err` means none is.
#[trait_variant::make(BatchHandler: Send)]
pub trait LocalBatchHandler<T> {
    /// Process one batch
    ///
    /// # Errors
    /// Returns handler error (should include context)
    async fn handle(&self, items: Vec<T>) -> Result<(), HandlerError>;
}

/// Handler backed by an async closure, see [`handler_fn`]
#[derive(Clone)]
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a [`BatchHandler`]
///
/// ```ignore
/// let handler = contracts::handler_fn(|customers: Vec<Customer>| async move {
///     store.save_all(customers).await.map_err(|e| HandlerError::with_source("save", e))
/// });
/// ```
pub fn handler_fn<T, F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Vec<T>) -> Fut,
    Fut: Future<Output = Result<(), HandlerError>>,
{
    FnHandler { f }
}

impl<T, F, Fut> BatchHandler<T> for FnHandler<F>
where
    T: Send,
    F: Fn(Vec<T>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, items: Vec<T>) -> Result<(), HandlerError> {
        (self.f)(items).await
    }
}
