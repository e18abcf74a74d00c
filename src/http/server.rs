//! Accept loop and per-connection serving.
//!
//! ```text
//!   accept ──► spawn on tracker ──► serve_connection_with_upgrades
//!     │                                   │
//!     │ closing.cancelled()               │ closing.cancelled()
//!     ▼                                   ▼
//!   Err(ServerClosed)               graceful_shutdown ──► finish in-flight ──► close
//! ```

use std::io;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::response::Response;
use hyper::body::Incoming;
use hyper::{Method, Request};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;

use super::settings::ServerSettings;
use crate::context::Context;
use crate::error::Error;
use crate::events::EventKind;
use crate::subscribers::Reporter;

/// Pause after an accept error that is not tied to a single connection
/// (for example running out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

pub(crate) struct Server {
    pub(crate) listener: TcpListener,
    pub(crate) router: Router,
    pub(crate) settings: ServerSettings,
    pub(crate) tracker: TaskTracker,
    pub(crate) closing: CancellationToken,
    pub(crate) reporter: Reporter,
}

impl Server {
    /// Accepts connections until `closing` fires, then returns [`Error::ServerClosed`].
    pub(crate) async fn serve(self, ctx: Context) -> Result<(), Error> {
        let builder = self.connection_builder();

        loop {
            let stream = tokio::select! {
                biased;
                _ = self.closing.cancelled() => return Err(Error::ServerClosed),
                res = self.listener.accept() => match res {
                    Ok((stream, _peer)) => stream,
                    Err(e) if is_connection_error(&e) => continue,
                    Err(e) => {
                        self.reporter.failed_connection(&ctx, &e);
                        if !back_off(&self.closing, ACCEPT_BACKOFF).await {
                            return Err(Error::ServerClosed);
                        }
                        continue;
                    }
                },
            };
            self.spawn_connection(&ctx, &builder, stream);
        }
    }

    fn connection_builder(&self) -> auto::Builder<TokioExecutor> {
        let mut builder = auto::Builder::new(TokioExecutor::new());
        {
            let mut http1 = builder.http1();
            http1
                .timer(TokioTimer::new())
                .max_buf_size(self.settings.http1_max_buf_size())
                .keep_alive(self.settings.keep_alive().is_some());
            if let Some(timeout) = self.settings.header_read_timeout() {
                http1.header_read_timeout(timeout);
            }
        }
        if let Some(interval) = self.settings.keep_alive() {
            builder
                .http2()
                .timer(TokioTimer::new())
                .keep_alive_interval(interval)
                .keep_alive_timeout(interval);
        }
        builder
    }

    fn spawn_connection(
        &self,
        ctx: &Context,
        builder: &auto::Builder<TokioExecutor>,
        stream: TcpStream,
    ) {
        let builder = builder.clone();
        let closing = self.closing.clone();
        let reporter = self.reporter.clone();
        let ctx = ctx.clone();

        let router = self.router.clone();
        let answer_options = !self.settings.disable_general_options_handler;
        let write_deadline = self.settings.write_deadline();
        let service = hyper::service::service_fn(move |req: Request<Incoming>| {
            handle(router.clone(), req, answer_options, write_deadline)
        });

        self.tracker.spawn(async move {
            let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
            tokio::pin!(conn);

            let res = tokio::select! {
                res = conn.as_mut() => res,
                _ = closing.cancelled() => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            };
            if let Err(e) = res {
                reporter.failed_connection(&ctx, &e);
            }
        });
    }
}

async fn handle(
    router: Router,
    req: Request<Incoming>,
    answer_options: bool,
    write_deadline: Option<Duration>,
) -> Result<Response, Error> {
    if answer_options && req.method() == Method::OPTIONS && req.uri() == "*" {
        return Ok(Response::new(Body::empty()));
    }

    let call = router.oneshot(req);
    let res = match write_deadline {
        Some(deadline) => tokio::time::timeout(deadline, call)
            .await
            .map_err(|_| Error::WriteTimeout(deadline))?,
        None => call.await,
    };
    match res {
        Ok(resp) => Ok(resp),
        Err(never) => match never {},
    }
}

/// Sleeps for `pause`; returns `false` if `closing` fired first.
async fn back_off(closing: &CancellationToken, pause: Duration) -> bool {
    tokio::select! {
        biased;
        _ = closing.cancelled() => false,
        _ = tokio::time::sleep(pause) => true,
    }
}

/// Accept errors that only concern the connection being accepted.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
    )
}

impl Reporter {
    fn failed_connection(&self, ctx: &Context, err: &dyn std::fmt::Display) {
        self.emit(
            ctx,
            self.event(EventKind::ConnectionFailed).with_reason(err.to_string()),
        );
    }
}
