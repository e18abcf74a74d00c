//! # Example: http_server
//!
//! Serves an axum router until Ctrl-C, then drains in-flight requests.
//!
//! Shows how to:
//! - Configure [`ServerSettings`] from environment variables.
//! - Serve a [`Router`] with [`HttpRuntime`].
//! - Close resources in a post-run hook once the server has drained.
//!
//! ## Flow
//! ```text
//! Ctrl-C ──► SignalReceived ──► cancel
//!              └─► HttpRuntime: stop accepting ──► finish /slow ──► ShutdownCompleted
//!                    └─► post-run hook
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example http_server --features fmt
//! curl localhost:8080/slow & sleep 0.5; kill -INT <pid>
//! ```

use std::time::Duration;

use axum::Router;
use axum::routing::get;
use runvisor::app::{self, BuilderExt, Lifecycle};
use runvisor::config;
use runvisor::http::{HttpRuntime, ServerSettings};
use runvisor::subscribers::{LogWriter, SubscriberSet};
use runvisor::{BoxError, Context};
use tokio::net::TcpListener;

async fn settings(ctx: Context) -> Result<ServerSettings, BoxError> {
    let defaults = ServerSettings::default();
    Ok(ServerSettings {
        write_timeout: config::must_or(
            &ctx,
            Duration::from_secs(10),
            &config::env_duration("HTTP_WRITE_TIMEOUT"),
        )
        .await,
        shutdown_timeout: config::must_or(
            &ctx,
            defaults.shutdown_timeout,
            &config::env_duration("HTTP_SHUTDOWN_TIMEOUT"),
        )
        .await,
        ..defaults
    })
}

#[tokio::main]
async fn main() -> Result<(), runvisor::Error> {
    runvisor::telemetry::init_subscriber();

    let builder = app::from_fn(settings).and_then(|settings, ctx: Context| async move {
        let addr = config::env("HTTP_ADDR").or(config::Reader::of("127.0.0.1:8080".to_string()));
        let addr = config::must(&ctx, &addr).await;
        let listener = TcpListener::bind(&addr).await?;

        if let Some(lifecycle) = Lifecycle::from_context(&ctx) {
            lifecycle.on_post_run(|_ctx| async {
                println!("[hook] server drained, closing resources");
                Ok::<_, BoxError>(())
            });
        }

        let router = Router::new()
            .route("/", get(|| async { "hello\n" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    "slow hello\n"
                }),
            );

        Ok::<_, BoxError>(
            HttpRuntime::new(listener, router)
                .with_settings(settings)
                .with_subscribers(SubscriberSet::single(LogWriter::new())),
        )
    });

    app::run(builder).await
}
