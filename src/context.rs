//! # Cancellable, deadline-carrying execution context.
//!
//! [`Context`] is passed to every suspendable operation in runvisor. It bundles:
//! - a [`CancellationToken`] (cancelling a context cancels everything derived from it);
//! - an optional deadline (derived contexts keep the earliest one);
//! - an [`opentelemetry::Context`] which doubles as the tracing context and a
//!   type-keyed bag for request-scoped values.
//!
//! ## Derivation
//! ```text
//! background()
//!   └─► child()            (new token, child of parent token)
//!         ├─► with_timeout(d)    (child + deadline = min(parent, now + d))
//!         └─► without_cancel()   (fresh token, no deadline, same values)
//! ```
//!
//! ## Rules
//! - `cancel()` is idempotent.
//! - A context is *done* once its token is cancelled or its deadline passed.
//! - Deadlines never cancel the token; they are observed by `is_done`/`done`.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Cancellation + deadline + value bag threaded through every call.
///
/// Cheap to clone; clones share the same cancellation state.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use runvisor::Context;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let root = Context::background();
/// let child = root.child();
///
/// root.cancel();
/// child.done().await;
/// assert!(child.is_done());
/// assert!(matches!(child.err(), Some(runvisor::Error::Canceled)));
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
    trace: opentelemetry::Context,
}

impl Context {
    /// Returns a root context: never cancelled unless [`cancel`](Self::cancel) is called, no deadline.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            trace: opentelemetry::Context::new(),
        }
    }

    /// Derives a context that is cancelled with its parent and can be cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            trace: self.trace.clone(),
        }
    }

    /// Derives a child context that is done at `now + timeout` at the latest.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a child context that is done at `deadline` at the latest.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut ctx = self.child();
        ctx.deadline = Some(match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        });
        ctx
    }

    /// Derives a context that keeps values and trace context but is detached
    /// from the parent's cancellation and deadline.
    pub fn without_cancel(&self) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            trace: self.trace.clone(),
        }
    }

    /// Cancels this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Reports whether the context is cancelled or past its deadline.
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Completes once the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Returns why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<Error> {
        if self.token.is_cancelled() {
            Some(Error::Canceled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(Error::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Returns the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the underlying cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns the tracing context carried by this context.
    pub fn trace_context(&self) -> &opentelemetry::Context {
        &self.trace
    }

    /// Returns a copy of this context carrying `trace` as its tracing context.
    ///
    /// Cancellation state is shared with `self`.
    pub fn with_trace_context(&self, trace: opentelemetry::Context) -> Self {
        Self {
            token: self.token.clone(),
            deadline: self.deadline,
            trace,
        }
    }

    /// Returns a copy of this context carrying `value`, keyed by its type.
    pub fn with_value<T: Send + Sync + 'static>(&self, value: T) -> Self {
        self.with_trace_context(self.trace.with_value(value))
    }

    /// Looks up a value stored with [`with_value`](Self::with_value).
    pub fn value<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.trace.get::<T>()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}
