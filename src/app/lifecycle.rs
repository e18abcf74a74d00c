//! # Post-run hooks.
//!
//! [`BuildAndRun`](super::BuildAndRun) stores a [`Lifecycle`] in the build
//! [`Context`]. Builders that acquire resources needing an orderly release
//! (flushing a producer, closing a pool) register a hook; hooks run after the
//! App returns, on success and on failure alike.
//!
//! ## Rules
//! - Hooks run in reverse registration order, one at a time.
//! - Hooks receive a context detached from cancellation (the run context is
//!   usually already cancelled by then).
//! - Hook errors and panics are joined into the run's result; a failing hook
//!   does not prevent later hooks from running.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use crate::context::Context;
use crate::error::{BoxError, Error};
use crate::group::{self, Task};

/// Registry of hooks attached to one run.
#[derive(Clone, Default)]
pub struct Lifecycle {
    post_run: Arc<Mutex<Vec<Task>>>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the lifecycle of the run `ctx` belongs to, if any.
    pub fn from_context(ctx: &Context) -> Option<&Lifecycle> {
        ctx.value::<Lifecycle>()
    }

    /// Registers a hook to run once the App has returned.
    ///
    /// # Example
    /// ```
    /// use runvisor::{BoxError, Context, app::{self, Lifecycle}};
    ///
    /// let builder = app::from_fn(|ctx: Context| async move {
    ///     if let Some(lc) = Lifecycle::from_context(&ctx) {
    ///         lc.on_post_run(|_ctx| async { Ok::<_, BoxError>(()) /* flush */ });
    ///     }
    ///     Ok::<_, BoxError>(app::app_fn(|_ctx: Context| async { Ok::<_, BoxError>(()) }))
    /// });
    /// # let _ = builder;
    /// ```
    pub fn on_post_run<F, Fut, E>(&self, f: F)
    where
        F: FnOnce(Context) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.post_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(group::task(f));
    }

    /// Number of registered hooks that have not run yet.
    pub fn pending(&self) -> usize {
        self.post_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Runs and drains every registered hook.
    pub(crate) async fn run_post_run(&self, ctx: &Context) -> Result<(), Error> {
        let hooks = std::mem::take(
            &mut *self.post_run.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let detached = ctx.without_cancel();

        let mut errors = Vec::new();
        for hook in hooks.into_iter().rev() {
            if let Err(e) = group::run_recovered(hook, detached.clone()).await {
                errors.push(e);
            }
        }
        match Error::join(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("pending", &self.pending())
            .finish()
    }
}
