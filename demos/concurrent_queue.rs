//! # Example: concurrent_queue
//!
//! Feeds jobs through a bounded worker pool with at-least-once acknowledgement.
//!
//! Shows how to:
//! - Bound overlapping work with `with_max_concurrent_processors`.
//! - Wrap a processor in [`AtLeastOnce`] to ack only processed jobs.
//! - Observe failures and panics through a custom [`Subscribe`]r.
//!
//! ## Flow
//! ```text
//! producer ──► handoff ──► dispatcher ──┬──► worker (process, then ack)
//!                                       ├──► worker
//!                                       └──► worker   (at most DEMO_WORKERS)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example concurrent_queue --features fmt
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use runvisor::app;
use runvisor::config;
use runvisor::events::{Event, EventKind};
use runvisor::queue::{Acknowledger, AtLeastOnce, Concurrent, consumer_fn, processor_fn};
use runvisor::subscribers::{LogWriter, Subscribe, SubscriberSet};
use runvisor::{BoxError, Context};

/// Counts failed jobs.
#[derive(Default)]
struct FailureCounter {
    failed: AtomicU64,
}

impl Subscribe for FailureCounter {
    fn on_event(&self, _ctx: &Context, event: &Event) {
        if matches!(event.kind, EventKind::ProcessFailed | EventKind::PanicRecovered) {
            let total = self.failed.fetch_add(1, Ordering::Relaxed) + 1;
            let last = event.reason.as_deref().unwrap_or("-");
            println!("[failures] {total} so far (last: {last})");
        }
    }
}

/// Pretends to delete jobs from a remote queue.
struct Ledger {
    acked: AtomicU64,
}

#[async_trait]
impl Acknowledger<u64> for Ledger {
    async fn ack(&self, _ctx: &Context, job: &u64) -> Result<(), BoxError> {
        self.acked.fetch_add(1, Ordering::Relaxed);
        println!("[ack] job {job}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), runvisor::Error> {
    runvisor::telemetry::init_subscriber();

    app::run(app::from_fn(|ctx: Context| async move {
        let workers = config::must_or(&ctx, 4usize, &config::env_parse("DEMO_WORKERS")).await;
        let run_for = config::must_or(
            &ctx,
            Duration::from_secs(3),
            &config::env_duration("DEMO_RUN_FOR"),
        )
        .await;

        let next = Arc::new(AtomicU64::new(0));
        let consumer = consumer_fn(move |_ctx: Context| {
            let job = next.fetch_add(1, Ordering::Relaxed);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, BoxError>(job)
            }
        });
        let processor = processor_fn(|_ctx: Context, job: u64| async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            match job % 10 {
                7 => Err::<(), BoxError>(format!("job {job} is malformed").into()),
                9 => panic!("job {job} crashed the worker"),
                _ => Ok(()),
            }
        });
        let ledger = Ledger { acked: AtomicU64::new(0) };

        let subscribers = SubscriberSet::new(vec![
            Arc::new(LogWriter::new()),
            Arc::new(FailureCounter::default()),
        ]);
        let runtime = Concurrent::new(consumer, AtLeastOnce::new(ledger, processor))
            .with_name("jobs")
            .with_max_concurrent_processors(workers)
            .with_subscribers(subscribers);

        let deadline = app::app_fn(move |ctx: Context| async move {
            tokio::select! {
                _ = ctx.done() => {}
                _ = tokio::time::sleep(run_for) => ctx.cancel(),
            }
            Ok::<_, BoxError>(())
        });

        Ok::<_, BoxError>(app::join(runtime, deadline))
    }))
    .await
}
