//! Just the [`Batch`] struct.

use std::ops::{Deref, DerefMut};
use tracing::trace;

/// The items produced by one activation of a partition, along with the
/// tracing span of that activation.
///
/// The span travels with the data: whoever consumes the batch should enter
/// it while processing, so downstream work shows up as a child of the
/// activation that produced it. Use [`Batch::in_scope`] for sync code, or
/// [`tracing::Instrument`] with a clone of [`Batch::span`] for async code.
///
/// ```rust
/// use periodic_source::Batch;
///
/// fn print_batch(batch: &Batch<u64>) {
///     batch.in_scope(|items| {
///         for item in items {
///             println!("{item}");
///         }
///     });
/// }
/// ```
#[derive(Debug)]
pub struct Batch<T> {
    items: Vec<T>,
    worker_index: usize,

    span: tracing::Span,
}

impl<T> Deref for Batch<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl<T> DerefMut for Batch<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.items
    }
}

impl<T> Batch<T> {
    /// Create a new batch produced by worker `worker_index` within `span`.
    pub fn new(items: Vec<T>, worker_index: usize, span: tracing::Span) -> Self {
        Self {
            items,
            worker_index,
            span,
        }
    }

    /// Run a function within the scope of this batch's span.
    pub fn in_scope<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[T]) -> R,
    {
        self.span().in_scope(|| f(&self.items))
    }

    /// Index of the worker whose partition produced this batch.
    pub const fn worker_index(&self) -> usize {
        self.worker_index
    }

    /// Get the tracing span associated with this batch.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Take the items, dropping the span.
    pub fn into_items(mut self) -> Vec<T> {
        std::mem::take(&mut self.items)
    }
}

impl<T> Drop for Batch<T> {
    fn drop(&mut self) {
        self.span().in_scope(|| {
            trace!("Dropping batch");
        });
    }
}
