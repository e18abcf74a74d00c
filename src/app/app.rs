//! # App: a runnable unit.
//!
//! [`App::run`] takes `self` by value, so an instance can only ever be run once.
//!
//! ## Rules
//! - `run` returns when the app finishes, the context is cancelled, or a fatal error occurs.
//! - Cancellation must be honoured within a bounded grace period.
//! - Observing cancellation cleanly is not a failure: return `Ok(())`.

use std::future::Future;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::{BoxError, Error};
use crate::group;

/// A runnable unit exposing `run(Context)`.
#[async_trait]
pub trait App: Send + 'static {
    /// Runs the app until completion or cancellation.
    async fn run(self, ctx: Context) -> Result<(), Error>;
}

/// Closure-backed [`App`].
///
/// Create with [`app_fn`].
pub struct AppFn<F> {
    f: F,
}

/// Wraps a one-shot closure into an [`App`].
///
/// # Example
/// ```
/// use runvisor::{Context, app::{self, App}};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ticker = app::app_fn(|ctx: Context| async move {
///     ctx.done().await;
///     Ok::<_, std::io::Error>(())
/// });
///
/// let ctx = Context::background();
/// ctx.cancel();
/// ticker.run(ctx).await.unwrap();
/// # }
/// ```
pub fn app_fn<F, Fut, E>(f: F) -> AppFn<F>
where
    F: FnOnce(Context) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    AppFn { f }
}

#[async_trait]
impl<F, Fut, E> App for AppFn<F>
where
    F: FnOnce(Context) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    async fn run(self, ctx: Context) -> Result<(), Error> {
        (self.f)(ctx).await.map_err(|e| Error::from_boxed(e.into()))
    }
}

/// Two apps run side by side in one task group.
pub struct Join<A, B> {
    a: A,
    b: B,
}

/// Runs `a` and `b` concurrently; the first failure cancels the other.
pub fn join<A: App, B: App>(a: A, b: B) -> Join<A, B> {
    Join { a, b }
}

#[async_trait]
impl<A: App, B: App> App for Join<A, B> {
    async fn run(self, ctx: Context) -> Result<(), Error> {
        let Join { a, b } = self;
        group::wait(
            &ctx,
            vec![
                group::task(move |ctx| a.run(ctx)),
                group::task(move |ctx| b.run(ctx)),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_join_failure_cancels_sibling() {
        let waiter = app_fn(|ctx: Context| async move {
            ctx.done().await;
            Ok::<_, BoxError>(())
        });
        let failing = app_fn(|_ctx: Context| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Err::<(), _>(std::io::Error::other("listener gone"))
        });

        let res = tokio::time::timeout(
            Duration::from_secs(1),
            join(waiter, failing).run(Context::background()),
        )
        .await
        .unwrap();

        let err = res.unwrap_err();
        assert!(err.contains::<std::io::Error>());
    }

    #[tokio::test]
    async fn test_app_fn_keeps_own_error() {
        let app = app_fn(|_ctx: Context| async { Err::<(), _>(Error::ServerClosed) });
        let err = app.run(Context::background()).await.unwrap_err();
        assert!(matches!(err, Error::ServerClosed));
    }
}
