//! # Builder: deferred construction of a value from a [`Context`].
//!
//! A [`Builder`] describes *how* to produce a value; nothing happens until a
//! [`Runner`](super::Runner) calls [`Builder::build`]. A failed build must not
//! leak resources: everything acquired so far is owned and dropped on return.
//!
//! ## Combinators
//! ```text
//! from_fn(f) ──► .map(g) ──► .and_then(h)
//!     │              │             │
//!   f(ctx)?      g(value)     h(value, ctx)?
//! ```

use std::future::Future;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::BoxError;

/// Produces a value given a [`Context`].
#[async_trait]
pub trait Builder: Send + Sync {
    /// The built value.
    type Output: Send + 'static;

    /// Builds the value. Called once per run.
    async fn build(&self, ctx: &Context) -> Result<Self::Output, BoxError>;
}

/// Closure-backed [`Builder`].
///
/// Create with [`from_fn`].
#[derive(Clone, Debug)]
pub struct BuilderFn<F> {
    f: F,
}

/// Wraps `f` into a [`Builder`].
///
/// # Example
/// ```
/// use runvisor::{Context, app::{self, Builder}};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let port = app::from_fn(|_ctx: Context| async { Ok::<_, runvisor::BoxError>(8080u16) });
/// assert_eq!(port.build(&Context::background()).await.unwrap(), 8080);
/// # }
/// ```
pub fn from_fn<F, Fut, T, E>(f: F) -> BuilderFn<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError> + 'static,
{
    BuilderFn { f }
}

#[async_trait]
impl<F, Fut, T, E> Builder for BuilderFn<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError> + 'static,
{
    type Output = T;

    async fn build(&self, ctx: &Context) -> Result<T, BoxError> {
        (self.f)(ctx.clone()).await.map_err(Into::into)
    }
}

/// Builder transforming the output of another builder.
#[derive(Clone, Debug)]
pub struct Map<B, F> {
    inner: B,
    f: F,
}

#[async_trait]
impl<B, F, U> Builder for Map<B, F>
where
    B: Builder,
    F: Fn(B::Output) -> U + Send + Sync,
    U: Send + 'static,
{
    type Output = U;

    async fn build(&self, ctx: &Context) -> Result<U, BoxError> {
        let value = self.inner.build(ctx).await?;
        Ok((self.f)(value))
    }
}

/// Builder feeding the output of another builder into a fallible step.
#[derive(Clone, Debug)]
pub struct AndThen<B, F> {
    inner: B,
    f: F,
}

#[async_trait]
impl<B, F, Fut, U, E> Builder for AndThen<B, F>
where
    B: Builder,
    F: Fn(B::Output, Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<U, E>> + Send + 'static,
    U: Send + 'static,
    E: Into<BoxError> + 'static,
{
    type Output = U;

    async fn build(&self, ctx: &Context) -> Result<U, BoxError> {
        let value = self.inner.build(ctx).await?;
        (self.f)(value, ctx.clone()).await.map_err(Into::into)
    }
}

/// Combinators available on every [`Builder`].
pub trait BuilderExt: Builder + Sized {
    /// Transforms the built value.
    fn map<F, U>(self, f: F) -> Map<Self, F>
    where
        F: Fn(Self::Output) -> U + Send + Sync,
    {
        Map { inner: self, f }
    }

    /// Chains a fallible, async step after the build.
    fn and_then<F, Fut, U, E>(self, f: F) -> AndThen<Self, F>
    where
        F: Fn(Self::Output, Context) -> Fut + Send + Sync,
        Fut: Future<Output = Result<U, E>> + Send,
    {
        AndThen { inner: self, f }
    }
}

impl<B: Builder> BuilderExt for B {}
