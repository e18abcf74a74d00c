//! # Consumer / Processor contracts.
//!
//! The two minimal interfaces the queue runtimes drive:
//!
//! ```text
//! Consumer::consume(ctx) ──► Ok(item) ──► Processor::process(ctx, item)
//!          │
//!          ├─► Err(NoItem)  nothing right now, try again (silent)
//!          └─► Err(other)   transient, reported, loop continues
//! ```
//!
//! ## Rules
//! - `consume` may block waiting for input but must honour cancellation.
//! - The consumer owns its backoff; runtimes only yield between attempts.
//! - `process` receives the item by value; errors and panics are reported per item.
//! - Neither may retain the [`Context`] past return.

use std::future::Future;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::BoxError;

/// Sentinel error: the consumer has nothing right now.
///
/// # Example
/// ```
/// use runvisor::queue::NoItem;
///
/// let err: runvisor::BoxError = NoItem.into();
/// assert!(NoItem::is(&err));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, thiserror::Error)]
#[error("no item available")]
pub struct NoItem;

impl NoItem {
    /// Reports whether `err` is the [`NoItem`] sentinel.
    pub fn is(err: &BoxError) -> bool {
        err.is::<NoItem>()
    }
}

/// A source of items.
#[async_trait]
pub trait Consumer: Send + Sync + 'static {
    /// Item produced by this consumer.
    type Item: Send + 'static;

    /// Returns the next item, [`NoItem`], or a transient error.
    async fn consume(&self, ctx: &Context) -> Result<Self::Item, BoxError>;
}

/// A sink doing work on one item.
#[async_trait]
pub trait Processor<T>: Send + Sync + 'static {
    /// Processes `item`.
    async fn process(&self, ctx: &Context, item: T) -> Result<(), BoxError>;
}

/// Closure-backed [`Consumer`]; create with [`consumer_fn`].
pub struct ConsumerFn<F> {
    f: F,
}

/// Wraps `f` into a [`Consumer`].
pub fn consumer_fn<F, Fut, T, E>(f: F) -> ConsumerFn<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError> + 'static,
{
    ConsumerFn { f }
}

#[async_trait]
impl<F, Fut, T, E> Consumer for ConsumerFn<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError> + 'static,
{
    type Item = T;

    async fn consume(&self, ctx: &Context) -> Result<T, BoxError> {
        (self.f)(ctx.clone()).await.map_err(Into::into)
    }
}

/// Closure-backed [`Processor`]; create with [`processor_fn`].
pub struct ProcessorFn<F> {
    f: F,
}

/// Wraps `f` into a [`Processor`].
pub fn processor_fn<F, Fut, T, E>(f: F) -> ProcessorFn<F>
where
    F: Fn(Context, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError> + 'static,
{
    ProcessorFn { f }
}

#[async_trait]
impl<F, Fut, T, E> Processor<T> for ProcessorFn<F>
where
    F: Fn(Context, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError> + 'static,
{
    async fn process(&self, ctx: &Context, item: T) -> Result<(), BoxError> {
        (self.f)(ctx.clone(), item).await.map_err(Into::into)
    }
}
