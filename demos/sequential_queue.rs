//! # Example: sequential_queue
//!
//! Drains an in-memory mailbox one message at a time.
//!
//! Shows how to:
//! - Read settings lazily with [`config`] readers.
//! - Build a [`Sequential`] runtime from closures.
//! - Register a post-run hook through [`Lifecycle`].
//! - Stop the process with Ctrl-C, or after `DEMO_RUN_FOR` (default `3s`).
//!
//! ## Flow
//! ```text
//! app::run(builder)
//!   ├─► build: fill mailbox, register hook, Sequential::new(...)
//!   ├─► run:   consume ──► process ──► consume ──► ... (until cancelled)
//!   └─► post-run hook: report what is left in the mailbox
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=runvisor=debug cargo run --example sequential_queue --features fmt
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use runvisor::app::{self, Lifecycle};
use runvisor::config;
use runvisor::queue::{NoItem, Sequential, consumer_fn, processor_fn};
use runvisor::subscribers::{LogWriter, SubscriberSet};
use runvisor::{BoxError, Context};

type Mailbox = Arc<Mutex<VecDeque<String>>>;

#[tokio::main]
async fn main() -> Result<(), runvisor::Error> {
    runvisor::telemetry::init_subscriber();

    app::run(app::from_fn(build)).await
}

async fn build(ctx: Context) -> Result<impl app::App, BoxError> {
    let messages = config::must_or(&ctx, 5usize, &config::env_parse("DEMO_MESSAGES")).await;
    let run_for = config::must_or(
        &ctx,
        Duration::from_secs(3),
        &config::env_duration("DEMO_RUN_FOR"),
    )
    .await;

    let mailbox: Mailbox = Arc::new(Mutex::new(
        (1..=messages).map(|i| format!("message #{i}")).collect(),
    ));

    if let Some(lifecycle) = Lifecycle::from_context(&ctx) {
        let mailbox = Arc::clone(&mailbox);
        lifecycle.on_post_run(move |_ctx| async move {
            let left = mailbox.lock().map(|m| m.len()).unwrap_or_default();
            println!("[hook] mailbox closed with {left} message(s) left");
            Ok::<_, BoxError>(())
        });
    }

    let consumer = consumer_fn(move |_ctx: Context| {
        let next = mailbox.lock().ok().and_then(|mut m| m.pop_front());
        async move {
            match next {
                Some(msg) => Ok(msg),
                None => {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Err(NoItem)
                }
            }
        }
    });
    let processor = processor_fn(|_ctx: Context, msg: String| async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        println!("[process] {msg}");
        Ok::<_, BoxError>(())
    });

    let runtime = Sequential::new(consumer, processor)
        .with_name("mailbox")
        .with_subscribers(SubscriberSet::single(LogWriter::new()));

    let deadline = app::app_fn(move |ctx: Context| async move {
        tokio::select! {
            _ = ctx.done() => {}
            _ = tokio::time::sleep(run_for) => ctx.cancel(),
        }
        Ok::<_, BoxError>(())
    });

    Ok(app::join(runtime, deadline))
}
