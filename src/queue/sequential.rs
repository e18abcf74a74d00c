//! # Sequential: consume one, process one.
//!
//! ```text
//!        ┌──────────────── NoItem / error / panic (yield) ───────────────┐
//!        ▼                                                               │
//!      Idle ──► Consuming ──► item ──► cancelled? ──no──► Processing ──► Idle
//!        │          │                      │
//!        └──────────┴── cancelled ─────────┴──► return Ok(())
//! ```
//!
//! ## Rules
//! - At most one item in flight: consuming item N+1 starts after processing item N returned.
//! - Only cancellation ends the loop; consume/process failures never do.
//! - An item consumed right before cancellation is dropped unprocessed.

use async_trait::async_trait;

use super::config::QueueConfig;
use super::consumer::{Consumer, Processor};
use super::step::{Consumed, consume_once, process_once};
use crate::app::App;
use crate::context::Context;
use crate::error::Error;
use crate::events::{EventKind, Stage};
use crate::subscribers::{Reporter, SubscriberSet};

/// Strictly ordered queue runtime.
///
/// # Example
/// ```
/// use runvisor::{BoxError, Context, app::App};
/// use runvisor::queue::{NoItem, Sequential, consumer_fn, processor_fn};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let consumer = consumer_fn(|ctx: Context| async move {
///     ctx.done().await;
///     Err::<u32, _>(NoItem)
/// });
/// let processor = processor_fn(|_ctx: Context, _n: u32| async { Ok::<_, BoxError>(()) });
///
/// let ctx = Context::background();
/// ctx.cancel();
/// Sequential::new(consumer, processor).run(ctx).await.unwrap();
/// # }
/// ```
pub struct Sequential<C, P> {
    consumer: C,
    processor: P,
    config: QueueConfig,
    subscribers: SubscriberSet,
}

impl<C, P> Sequential<C, P>
where
    C: Consumer,
    P: Processor<C::Item>,
{
    /// Creates a runtime with default settings and no subscribers.
    pub fn new(consumer: C, processor: P) -> Self {
        Self {
            consumer,
            processor,
            config: QueueConfig {
                name: "sequential".to_string(),
                ..QueueConfig::default()
            },
            subscribers: SubscriberSet::default(),
        }
    }

    /// Replaces the settings.
    pub fn with_config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the runtime name used in events.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Sets the subscribers receiving runtime events.
    pub fn with_subscribers(mut self, subscribers: SubscriberSet) -> Self {
        self.subscribers = subscribers;
        self
    }
}

#[async_trait]
impl<C, P> App for Sequential<C, P>
where
    C: Consumer,
    P: Processor<C::Item>,
{
    async fn run(self, ctx: Context) -> Result<(), Error> {
        let reporter = Reporter::new(self.config.name.as_str(), self.subscribers);
        reporter.emit(&ctx, reporter.event(EventKind::RuntimeStarting));

        while !ctx.is_done() {
            let item = match consume_once(&ctx, &self.consumer, &reporter).await {
                Consumed::Item(item) => item,
                Consumed::Skip => {
                    tokio::task::yield_now().await;
                    continue;
                }
                Consumed::Cancelled => break,
            };

            if ctx.is_done() {
                reporter.emit(
                    &ctx,
                    reporter.event(EventKind::ItemDropped).with_stage(Stage::Process),
                );
                break;
            }

            if !process_once(&ctx, &self.processor, item, &reporter).await {
                tokio::task::yield_now().await;
            }
        }

        reporter.emit(&ctx, reporter.event(EventKind::RuntimeStopped));
        Ok(())
    }
}
