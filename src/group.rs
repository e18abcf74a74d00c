//! # TaskGroup: run N tasks, stop on first failure, never lose a panic.
//!
//! [`TaskGroup`] supervises concurrently running tasks under a derived
//! [`Context`]. It is the primitive every runtime in this crate composes with.
//!
//! ## Architecture
//! ```text
//! parent ctx ──► child() ──► group ctx ──┬──► task 1 ──┐
//!                                        ├──► task 2 ──┼──► JoinSet ──► wait()
//!                                        └──► task N ──┘        │
//!                                                                 └─► Error::join(errors)
//!
//! task failure / panic ──► group ctx.cancel() ──► siblings observe cancellation
//! ```
//!
//! ## Rules
//! - Each task receives the group context, cancelled when the parent is or when any task fails.
//! - Panics are recovered at the task boundary (see [`Error::from_panic`]) and count as failures.
//! - A panic payload keeps its error only when it is an [`Error`], a [`BoxError`]
//!   or a `std::io::Error`; panic with `std::panic::panic_any(BoxError::from(e))`
//!   to surface any other error type intact.
//! - `wait()` returns only after **every** task has finished.
//! - With a limit, `spawn()` waits for a free slot; `0` means unbounded.
//! - The group context is cancelled when the group is waited or dropped.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::DropGuard;

use crate::context::Context;
use crate::error::{BoxError, Error};

/// A boxed task accepted by [`wait`].
pub type Task = Box<dyn FnOnce(Context) -> BoxFuture<'static, Result<(), Error>> + Send>;

/// Boxes a closure into a [`Task`].
///
/// Any error type convertible into [`BoxError`] is accepted; errors that are
/// already [`Error`] values keep their shape.
pub fn task<F, Fut, E>(f: F) -> Task
where
    F: FnOnce(Context) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError>,
{
    Box::new(move |ctx: Context| {
        async move { f(ctx).await.map_err(|e| Error::from_boxed(e.into())) }.boxed()
    })
}

/// Runs every task concurrently and waits for all of them.
///
/// Returns the join of all task errors, or `Ok(())` when all succeeded.
///
/// # Example
/// ```
/// use runvisor::{Context, group};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let res = group::wait(&Context::background(), vec![
///     group::task(|_ctx| async { Ok::<_, std::io::Error>(()) }),
///     group::task(|ctx: Context| async move {
///         ctx.done().await; // cancelled once the sibling fails
///         Ok::<_, std::io::Error>(())
///     }),
///     group::task(|_ctx| async { Err(std::io::Error::other("boom")) }),
/// ]).await;
///
/// assert!(res.unwrap_err().contains::<std::io::Error>());
/// # }
/// ```
pub async fn wait(parent: &Context, tasks: Vec<Task>) -> Result<(), Error> {
    let mut group = TaskGroup::new(parent);
    for t in tasks {
        group.spawn_boxed(t).await;
    }
    group.wait().await
}

/// Incrementally built task group with an optional concurrency limit.
pub struct TaskGroup {
    ctx: Context,
    set: JoinSet<Result<(), Error>>,
    slots: Option<Arc<Semaphore>>,
    errors: Vec<Error>,
    _cancel_on_drop: DropGuard,
}

impl TaskGroup {
    /// Creates an unbounded group whose context derives from `parent`.
    pub fn new(parent: &Context) -> Self {
        let ctx = parent.child();
        let guard = ctx.token().clone().drop_guard();
        Self {
            ctx,
            set: JoinSet::new(),
            slots: None,
            errors: Vec::new(),
            _cancel_on_drop: guard,
        }
    }

    /// Limits the number of tasks running at once (`0` = unbounded).
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.slots = match limit {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        self
    }

    /// Returns the group context handed to every task.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Number of tasks spawned and not yet reaped.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Reports whether no task is pending.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Spawns a task, waiting for a free slot when the group is limited.
    pub async fn spawn<F, Fut, E>(&mut self, f: F)
    where
        F: FnOnce(Context) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.spawn_boxed(task(f)).await;
    }

    async fn spawn_boxed(&mut self, t: Task) {
        self.reap_finished();

        let permit = match &self.slots {
            Some(slots) => match Arc::clone(slots).acquire_owned().await {
                Ok(permit) => Some(permit),
                // never closed while the group holds it
                Err(_closed) => None,
            },
            None => None,
        };

        let ctx = self.ctx.clone();
        self.set.spawn(async move {
            let _permit = permit;
            let res = run_recovered(t, ctx.clone()).await;
            if res.is_err() {
                ctx.cancel();
            }
            res
        });
    }

    /// Waits for every task and joins their errors.
    pub async fn wait(mut self) -> Result<(), Error> {
        while let Some(joined) = self.set.join_next().await {
            self.collect(joined);
        }
        self.ctx.cancel();
        match Error::join(std::mem::take(&mut self.errors)) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.set.try_join_next() {
            self.collect(joined);
        }
    }

    fn collect(&mut self, joined: Result<Result<(), Error>, tokio::task::JoinError>) {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.errors.push(e),
            Err(join_err) if join_err.is_panic() => {
                self.ctx.cancel();
                self.errors.push(Error::from_panic(join_err.into_panic()));
            }
            Err(_aborted) => {
                self.ctx.cancel();
                self.errors.push(Error::Canceled);
            }
        }
    }
}

/// Runs a task, converting panics (in construction or while polled) into errors.
pub(crate) async fn run_recovered(t: Task, ctx: Context) -> Result<(), Error> {
    let fut = match std::panic::catch_unwind(AssertUnwindSafe(move || t(ctx))) {
        Ok(fut) => fut,
        Err(payload) => return Err(Error::from_panic(payload)),
    };
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(payload) => Err(Error::from_panic(payload)),
    }
}
