//! # Runner: build a value, then run it.
//!
//! A [`Runner`] takes a [`Builder`] whose output is an [`App`], builds it under
//! a [`Context`] and runs it. Behaviour is layered with decorators:
//!
//! ```text
//! NotifyOnSignal ──► RecoverPanics ──► BuildAndRun
//!   ctx.child()        catch_unwind       lifecycle → catch_unwind(build → run) → post-run hooks
//!   cancelled on          │
//!   any listed signal     └─► panic → Error (see Error::from_panic)
//! ```
//!
//! ## Rules
//! - A build failure surfaces as [`Error::Build`]; the app is never run.
//! - Post-run hooks run after every attempt, including failed or panicking
//!   builds and runs.
//! - Decorators compose by wrapping; every layer applies.
//! - Signal listeners exist only while the decorated run is in progress.
//!
//! ## Example
//! ```no_run
//! use runvisor::{BoxError, Context};
//! use runvisor::app::{self, BuildAndRun, Runner, RunnerExt, Signal};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), runvisor::Error> {
//! let builder = app::from_fn(|_ctx: Context| async {
//!     Ok::<_, BoxError>(app::app_fn(|ctx: Context| async move {
//!         ctx.done().await;
//!         Ok::<_, BoxError>(())
//!     }))
//! });
//!
//! BuildAndRun
//!     .recover_panics()
//!     .notify_on_signal([Signal::Interrupt, Signal::Terminate])
//!     .run(Context::background(), builder)
//!     .await
//! # }
//! ```

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;

use super::app::App;
use super::builder::Builder;
use super::lifecycle::Lifecycle;
use super::signals::{Listeners, Signal};
use crate::context::Context;
use crate::error::Error;
use crate::events::{Event, EventKind};
use crate::subscribers::{LogWriter, SubscriberSet};

/// Invokes a builder and runs the resulting app.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Builds the app from `builder` under `ctx`, then runs it.
    async fn run<B>(&self, ctx: Context, builder: B) -> Result<(), Error>
    where
        B: Builder + 'static,
        B::Output: App;
}

/// The base runner: build, run, then post-run hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildAndRun;

#[async_trait]
impl Runner for BuildAndRun {
    async fn run<B>(&self, ctx: Context, builder: B) -> Result<(), Error>
    where
        B: Builder + 'static,
        B::Output: App,
    {
        let lifecycle = Lifecycle::new();
        let ctx = ctx.with_value(lifecycle.clone());

        let attempt = async {
            match builder.build(&ctx).await {
                Ok(app) => app.run(ctx.clone()).await,
                Err(e) => Err(Error::Build(e)),
            }
        };
        // Hooks must run even when build or run unwinds.
        let run_res = match AssertUnwindSafe(attempt).catch_unwind().await {
            Ok(res) => res,
            Err(payload) => Err(Error::from_panic(payload)),
        };
        let hooks_res = lifecycle.run_post_run(&ctx).await;

        let errors: Vec<Error> = [run_res.err(), hooks_res.err()]
            .into_iter()
            .flatten()
            .collect();
        match Error::join(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Converts panics raised while building or running into errors.
#[derive(Debug, Clone)]
pub struct RecoverPanics<R> {
    inner: R,
}

#[async_trait]
impl<R: Runner> Runner for RecoverPanics<R> {
    async fn run<B>(&self, ctx: Context, builder: B) -> Result<(), Error>
    where
        B: Builder + 'static,
        B::Output: App,
    {
        match AssertUnwindSafe(self.inner.run(ctx, builder))
            .catch_unwind()
            .await
        {
            Ok(res) => res,
            Err(payload) => Err(Error::from_panic(payload)),
        }
    }
}

/// Cancels the run's context when any listed OS signal arrives.
#[derive(Debug, Clone)]
pub struct NotifyOnSignal<R> {
    inner: R,
    signals: Vec<Signal>,
    subscribers: SubscriberSet,
}

impl<R> NotifyOnSignal<R> {
    /// Replaces the subscribers notified of received signals.
    ///
    /// Defaults to a single [`LogWriter`].
    pub fn with_subscribers(mut self, subscribers: SubscriberSet) -> Self {
        self.subscribers = subscribers;
        self
    }
}

#[async_trait]
impl<R: Runner> Runner for NotifyOnSignal<R> {
    async fn run<B>(&self, ctx: Context, builder: B) -> Result<(), Error>
    where
        B: Builder + 'static,
        B::Output: App,
    {
        let mut listeners = Listeners::install(&self.signals).map_err(Error::Signal)?;
        let ctx = ctx.child();

        let mut run = self.inner.run(ctx.clone(), builder);
        tokio::select! {
            res = &mut run => return res,
            sig = listeners.recv() => {
                self.subscribers.emit(
                    &ctx,
                    Event::new(EventKind::SignalReceived).with_reason(sig.as_str()),
                );
                ctx.cancel();
            }
        }
        drop(listeners);
        run.await
    }
}

/// Decorator constructors available on every [`Runner`].
pub trait RunnerExt: Runner + Sized {
    /// Wraps the runner with panic recovery.
    fn recover_panics(self) -> RecoverPanics<Self> {
        RecoverPanics { inner: self }
    }

    /// Wraps the runner with a signal→cancel bridge.
    fn notify_on_signal(self, signals: impl IntoIterator<Item = Signal>) -> NotifyOnSignal<Self> {
        NotifyOnSignal {
            inner: self,
            signals: signals.into_iter().collect(),
            subscribers: SubscriberSet::single(LogWriter::new()),
        }
    }
}

impl<R: Runner> RunnerExt for R {}

/// Runs `builder` under a background context, cancelled on `SIGINT`/`SIGTERM`,
/// with panic recovery.
///
/// Signal receipt is logged through [`LogWriter`].
pub async fn run<B>(builder: B) -> Result<(), Error>
where
    B: Builder + 'static,
    B::Output: App,
{
    BuildAndRun
        .recover_panics()
        .notify_on_signal([Signal::Interrupt, Signal::Terminate])
        .run(Context::background(), builder)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{app_fn, from_fn};
    use crate::error::BoxError;
    use crate::subscribers::Recorder;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("no database url")]
    struct MissingUrl;

    /// Signals are process-wide; tests that raise them take turns.
    #[cfg(unix)]
    static SIGNAL_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

    #[tokio::test]
    async fn test_build_failure_skips_run() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_in_app = Arc::clone(&ran);
        let builder = from_fn(move |_ctx: Context| {
            let ran = Arc::clone(&ran_in_app);
            async move {
                if true {
                    return Err(MissingUrl);
                }
                Ok(app_fn(move |_ctx: Context| async move {
                    ran.store(true, Ordering::SeqCst);
                    Ok::<_, BoxError>(())
                }))
            }
        });

        let err = BuildAndRun
            .run(Context::background(), builder)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Build(_)));
        assert!(err.contains::<MissingUrl>());
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_post_run_hook_runs_after_app() {
        let flushed = Arc::new(AtomicBool::new(false));
        let flushed_hook = Arc::clone(&flushed);
        let builder = from_fn(move |ctx: Context| {
            let flushed = Arc::clone(&flushed_hook);
            async move {
                if let Some(lc) = Lifecycle::from_context(&ctx) {
                    lc.on_post_run(move |_ctx| async move {
                        flushed.store(true, Ordering::SeqCst);
                        Ok::<_, BoxError>(())
                    });
                }
                Ok::<_, BoxError>(app_fn(|_ctx: Context| async {
                    Err::<(), _>(std::io::Error::other("crashed"))
                }))
            }
        });

        let err = BuildAndRun
            .run(Context::background(), builder)
            .await
            .unwrap_err();
        assert!(err.contains::<std::io::Error>());
        assert!(flushed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_recover_panics_in_run() {
        let builder = from_fn(|_ctx: Context| async {
            Ok::<_, BoxError>(app_fn(|_ctx: Context| async {
                if true {
                    panic!("boom");
                }
                Ok::<_, BoxError>(())
            }))
        });

        let err = BuildAndRun
            .recover_panics()
            .run(Context::background(), builder)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "recovered from panic: boom");
    }

    #[tokio::test]
    async fn test_post_run_hook_runs_after_app_panic() {
        let flushed = Arc::new(AtomicBool::new(false));
        let flushed_hook = Arc::clone(&flushed);
        let builder = from_fn(move |ctx: Context| {
            let flushed = Arc::clone(&flushed_hook);
            async move {
                if let Some(lc) = Lifecycle::from_context(&ctx) {
                    lc.on_post_run(move |_ctx| async move {
                        flushed.store(true, Ordering::SeqCst);
                        Ok::<_, BoxError>(())
                    });
                }
                Ok::<_, BoxError>(app_fn(|_ctx: Context| async {
                    if true {
                        panic!("boom");
                    }
                    Ok::<_, BoxError>(())
                }))
            }
        });

        let err = BuildAndRun
            .recover_panics()
            .run(Context::background(), builder)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "recovered from panic: boom");
        assert!(flushed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_post_run_hook_runs_after_build_panic() {
        let flushed = Arc::new(AtomicBool::new(false));
        let flushed_hook = Arc::clone(&flushed);
        let builder = from_fn(move |ctx: Context| {
            let flushed = Arc::clone(&flushed_hook);
            async move {
                if let Some(lc) = Lifecycle::from_context(&ctx) {
                    lc.on_post_run(move |_ctx| async move {
                        flushed.store(true, Ordering::SeqCst);
                        Ok::<_, BoxError>(())
                    });
                }
                if true {
                    panic!("pool exhausted");
                }
                Ok::<_, BoxError>(app_fn(|_ctx: Context| async { Ok::<_, BoxError>(()) }))
            }
        });

        let err = BuildAndRun
            .run(Context::background(), builder)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "recovered from panic: pool exhausted");
        assert!(flushed.load(Ordering::SeqCst));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nested_signal_layers_each_cancel() {
        let _serial = SIGNAL_LOCK.lock().await;
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let started_tx = std::sync::Mutex::new(Some(started_tx));
        let builder = from_fn(move |_ctx: Context| {
            let tx = started_tx.lock().unwrap().take();
            async move {
                Ok::<_, BoxError>(app_fn(move |ctx: Context| async move {
                    if let Some(tx) = tx {
                        let _ = tx.send(());
                    }
                    ctx.done().await;
                    Ok::<_, BoxError>(())
                }))
            }
        });

        let inner = Arc::new(Recorder::default());
        let outer = Arc::new(Recorder::default());
        let runner = BuildAndRun
            .notify_on_signal([Signal::Quit])
            .with_subscribers(SubscriberSet::new(vec![inner.clone()]))
            .notify_on_signal([Signal::Hangup])
            .with_subscribers(SubscriberSet::new(vec![outer.clone()]));

        let handle = tokio::spawn(async move { runner.run(Context::background(), builder).await });
        started_rx.await.unwrap();

        let status = std::process::Command::new("kill")
            .args(["-QUIT", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let seen = inner.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].reason.as_deref(), Some("SIGQUIT"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signal_cancels_run() {
        let _serial = SIGNAL_LOCK.lock().await;
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let started_tx = std::sync::Mutex::new(Some(started_tx));
        let builder = from_fn(move |_ctx: Context| {
            let tx = started_tx.lock().unwrap().take();
            async move {
                Ok::<_, BoxError>(app_fn(move |ctx: Context| async move {
                    if let Some(tx) = tx {
                        let _ = tx.send(());
                    }
                    ctx.done().await;
                    Ok::<_, BoxError>(())
                }))
            }
        });

        let rec = Arc::new(Recorder::default());
        let runner = BuildAndRun
            .recover_panics()
            .notify_on_signal([Signal::Hangup])
            .with_subscribers(SubscriberSet::new(vec![rec.clone()]));

        let handle = tokio::spawn(async move { runner.run(Context::background(), builder).await });
        started_rx.await.unwrap();

        let status = std::process::Command::new("kill")
            .args(["-HUP", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(rec.count(EventKind::SignalReceived), 1);
        let seen = rec.seen.lock().unwrap();
        assert_eq!(seen[0].reason.as_deref(), Some("SIGHUP"));
    }
}
