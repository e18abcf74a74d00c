//! # HttpRuntime: an axum router served until cancellation, then drained.
//!
//! ```text
//! run(ctx)
//!   ├─► emit ServerListening
//!   └─► group::wait
//!         ├─ serve:    accept loop ──────────────────────────► Err(ServerClosed)
//!         └─ shutdown: ctx.done()
//!                        ├─► emit ShutdownRequested
//!                        ├─► closing.cancel()  (stop accepting, drain connections)
//!                        └─► timeout(shutdown_timeout, tracker.wait())
//!                              ├─ drained  → emit ShutdownCompleted
//!                              └─ expired  → emit GraceExceeded, Err(ShutdownTimeout)
//! ```
//!
//! ## Rules
//! - Cancellation of `ctx` starts the drain; the drain deadline is measured
//!   from that moment and cannot be cancelled.
//! - In-flight requests run to completion within the deadline.
//! - `ServerClosed` is benign: a clean drain returns `Ok(())`.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::server::Server;
use super::settings::ServerSettings;
use crate::app::App;
use crate::context::Context;
use crate::error::Error;
use crate::events::EventKind;
use crate::group;
use crate::subscribers::{Reporter, SubscriberSet};

/// Serves a [`Router`] on a bound listener as an [`App`].
///
/// # Example
/// ```no_run
/// use axum::{Router, routing::get};
/// use runvisor::http::HttpRuntime;
/// use runvisor::app;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), runvisor::Error> {
/// app::run(app::from_fn(|_ctx| async {
///     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
///     let router = Router::new().route("/", get(|| async { "hello" }));
///     Ok::<_, std::io::Error>(HttpRuntime::new(listener, router))
/// }))
/// .await
/// # }
/// ```
pub struct HttpRuntime {
    listener: TcpListener,
    router: Router,
    settings: ServerSettings,
    name: Arc<str>,
    subscribers: SubscriberSet,
}

impl HttpRuntime {
    /// Creates a runtime with default settings and no subscribers.
    pub fn new(listener: TcpListener, router: Router) -> Self {
        Self {
            listener,
            router,
            settings: ServerSettings::default(),
            name: Arc::from("http"),
            subscribers: SubscriberSet::default(),
        }
    }

    /// Replaces the server settings.
    pub fn with_settings(mut self, settings: ServerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the runtime name used in events.
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the subscribers receiving server events.
    pub fn with_subscribers(mut self, subscribers: SubscriberSet) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

#[async_trait]
impl App for HttpRuntime {
    async fn run(self, ctx: Context) -> Result<(), Error> {
        let reporter = Reporter::new(self.name, self.subscribers);
        let addr = self.listener.local_addr().map_err(Error::Serve)?;
        reporter.emit(
            &ctx,
            reporter
                .event(EventKind::ServerListening)
                .with_reason(addr.to_string()),
        );

        let tracker = TaskTracker::new();
        let closing = CancellationToken::new();
        let grace = self.settings.shutdown_timeout;

        let server = Server {
            listener: self.listener,
            router: self.router,
            settings: self.settings,
            tracker: tracker.clone(),
            closing: closing.clone(),
            reporter: reporter.clone(),
        };

        let res = group::wait(
            &ctx,
            vec![
                group::task(move |ctx| server.serve(ctx)),
                group::task(move |ctx| shutdown(ctx, closing, tracker, grace, reporter)),
            ],
        )
        .await;

        match res {
            Ok(()) => Ok(()),
            Err(err) => err.without_benign().map_or(Ok(()), Err),
        }
    }
}

async fn shutdown(
    ctx: Context,
    closing: CancellationToken,
    tracker: TaskTracker,
    grace: std::time::Duration,
    reporter: Reporter,
) -> Result<(), Error> {
    let _close_on_exit = closing.clone().drop_guard();
    ctx.done().await;

    reporter.emit(
        &ctx,
        reporter
            .event(EventKind::ShutdownRequested)
            .with_timeout(grace),
    );
    closing.cancel();
    tracker.close();

    match tokio::time::timeout(grace, tracker.wait()).await {
        Ok(()) => {
            reporter.emit(&ctx, reporter.event(EventKind::ShutdownCompleted));
            Ok(())
        }
        Err(_) => {
            let open = tracker.len();
            reporter.emit(
                &ctx,
                reporter
                    .event(EventKind::GraceExceeded)
                    .with_timeout(grace)
                    .with_reason(format!("{open} connection(s) still open")),
            );
            Err(Error::ShutdownTimeout { grace, open })
        }
    }
}
