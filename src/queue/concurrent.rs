//! # Concurrent: producer, dispatcher and a bounded worker pool.
//!
//! ```text
//!             group::wait(ctx)
//!   ┌──────────────────┴───────────────────┐
//!   Producer                               Dispatcher
//!   consume(ctx) ─► Item::capture          recv() ─► Item::restore ─► workers.spawn()
//!        │          (inject carrier)          ▲                          │  (blocks at cap)
//!        └──────► handoff.send() ─────────────┘                          ▼
//!                 (rendezvous)                                  process(item_ctx, value)
//! ```
//!
//! ## Rules
//! - Items are consumed in source order and dispatched in consumption order;
//!   they may complete in any order.
//! - At most `max_concurrent_processors` Process calls overlap (`0` = unbounded).
//! - A saturated pool stalls the dispatcher, which stalls the producer in `send`,
//!   which stops consumption. Nothing is buffered in between.
//! - Every consumed item is processed exactly once, or dropped (`ItemDropped`)
//!   because cancellation came first. Never processed twice.
//! - On cancellation the producer closes the hand-off; the dispatcher drains it,
//!   waits for in-flight workers and returns `Ok(())`. In-flight workers see a
//!   cancelled context and are expected to return promptly.

use std::sync::Arc;

use async_trait::async_trait;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry_sdk::propagation::TraceContextPropagator;

use super::config::QueueConfig;
use super::consumer::{Consumer, Processor};
use super::handoff::{self, Receiver, Sender};
use super::item::Item;
use super::step::{Consumed, consume_once, process_once};
use crate::app::App;
use crate::context::Context;
use crate::error::Error;
use crate::events::{EventKind, Stage};
use crate::group::{self, TaskGroup};
use crate::subscribers::{Reporter, SubscriberSet};

/// Shared trace propagator.
pub type Propagator = Arc<dyn TextMapPropagator + Send + Sync>;

/// Queue runtime with bounded concurrent processing.
pub struct Concurrent<C, P> {
    consumer: C,
    processor: P,
    config: QueueConfig,
    propagator: Propagator,
    subscribers: SubscriberSet,
}

impl<C, P> Concurrent<C, P>
where
    C: Consumer,
    P: Processor<C::Item>,
{
    /// Creates a runtime with an unbounded pool, the W3C trace-context
    /// propagator and no subscribers.
    pub fn new(consumer: C, processor: P) -> Self {
        Self {
            consumer,
            processor,
            config: QueueConfig {
                name: "concurrent".to_string(),
                ..QueueConfig::default()
            },
            propagator: Arc::new(TraceContextPropagator::new()),
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

    /// Caps overlapping Process calls (`0` = unbounded).
    pub fn with_max_concurrent_processors(mut self, n: usize) -> Self {
        self.config.max_concurrent_processors = n;
        self
    }

    /// Sets the propagator carrying trace context from producer to workers.
    pub fn with_propagator(mut self, propagator: Propagator) -> Self {
        self.propagator = propagator;
        self
    }

    /// Sets the subscribers receiving runtime events.
    pub fn with_subscribers(mut self, subscribers: SubscriberSet) -> Self {
        self.subscribers = subscribers;
        self
    }
}

#[async_trait]
impl<C, P> App for Concurrent<C, P>
where
    C: Consumer,
    P: Processor<C::Item>,
{
    async fn run(self, ctx: Context) -> Result<(), Error> {
        let Concurrent {
            consumer,
            processor,
            config,
            propagator,
            subscribers,
        } = self;
        let reporter = Reporter::new(config.name.as_str(), subscribers);
        reporter.emit(&ctx, reporter.event(EventKind::RuntimeStarting));

        let (tx, rx) = handoff::channel();
        let limit = config.concurrency_limit();

        let res = group::wait(
            &ctx,
            vec![
                group::task({
                    let reporter = reporter.clone();
                    let propagator = Arc::clone(&propagator);
                    move |ctx| produce(ctx, consumer, tx, propagator, reporter)
                }),
                group::task({
                    let reporter = reporter.clone();
                    let processor = Arc::new(processor);
                    move |ctx| dispatch(ctx, rx, processor, limit, propagator, reporter)
                }),
            ],
        )
        .await;

        let mut stopped = reporter.event(EventKind::RuntimeStopped);
        if let Err(e) = &res {
            stopped = stopped.with_reason(e.to_string());
        }
        reporter.emit(&ctx, stopped);
        res
    }
}

async fn produce<C: Consumer>(
    ctx: Context,
    consumer: C,
    tx: Sender<Item<C::Item>>,
    propagator: Propagator,
    reporter: Reporter,
) -> Result<(), Error> {
    while !ctx.is_done() {
        match consume_once(&ctx, &consumer, &reporter).await {
            Consumed::Item(value) => {
                let item = Item::capture(value, &ctx, propagator.as_ref());
                // An abandoned send leaves the item in the slot; the
                // dispatcher drops it once it sees the cancelled context.
                tokio::select! {
                    biased;
                    _ = ctx.done() => break,
                    sent = tx.send(item) => if sent.is_err() { break },
                }
            }
            Consumed::Skip => tokio::task::yield_now().await,
            Consumed::Cancelled => break,
        }
    }
    drop(tx);
    Ok(())
}

async fn dispatch<T, P>(
    ctx: Context,
    mut rx: Receiver<Item<T>>,
    processor: Arc<P>,
    limit: Option<usize>,
    propagator: Propagator,
    reporter: Reporter,
) -> Result<(), Error>
where
    T: Send + 'static,
    P: Processor<T>,
{
    let mut workers = match limit {
        Some(n) => TaskGroup::new(&ctx).with_limit(n),
        None => TaskGroup::new(&ctx),
    };

    while let Some(item) = rx.recv().await {
        if ctx.is_done() {
            drop_item(&ctx, &reporter);
            continue;
        }

        let processor = Arc::clone(&processor);
        let propagator = Arc::clone(&propagator);
        let worker_reporter = reporter.clone();
        let worker = move |group_ctx: Context| async move {
            let (value, item_ctx) = item.restore(&group_ctx, propagator.as_ref());
            process_once(&item_ctx, processor.as_ref(), value, &worker_reporter).await;
            Ok::<_, Error>(())
        };

        tokio::select! {
            biased;
            _ = ctx.done() => drop_item(&ctx, &reporter),
            _ = workers.spawn(worker) => {}
        }
    }

    workers.wait().await
}

fn drop_item(ctx: &Context, reporter: &Reporter) {
    reporter.emit(
        ctx,
        reporter.event(EventKind::ItemDropped).with_stage(Stage::Dispatch),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::queue::{NoItem, consumer_fn, processor_fn};
    use crate::subscribers::Recorder;
    use crate::events::Event;
    use crate::subscribers::Subscribe;
    use opentelemetry::propagation::{Extractor, Injector, text_map_propagator::FieldIter};
    use opentelemetry::trace::{
        SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
    };
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Cancels `ctx` once `kind` was seen `after` times.
    struct CancelAfter {
        ctx: Context,
        kind: EventKind,
        after: usize,
        seen: AtomicUsize,
    }

    impl Subscribe for CancelAfter {
        fn on_event(&self, _ctx: &Context, event: &Event) {
            if event.kind == self.kind && self.seen.fetch_add(1, Ordering::SeqCst) + 1 >= self.after
            {
                self.ctx.cancel();
            }
        }
    }

    /// W3C propagation that records what crosses the hand-off.
    #[derive(Debug, Default)]
    struct RecordingPropagator {
        inner: TraceContextPropagator,
        injected: AtomicUsize,
        extracted: Mutex<Vec<Option<String>>>,
    }

    impl TextMapPropagator for RecordingPropagator {
        fn inject_context(&self, cx: &opentelemetry::Context, injector: &mut dyn Injector) {
            self.injected.fetch_add(1, Ordering::SeqCst);
            self.inner.inject_context(cx, injector);
        }

        fn extract_with_context(
            &self,
            cx: &opentelemetry::Context,
            extractor: &dyn Extractor,
        ) -> opentelemetry::Context {
            self.extracted
                .lock()
                .unwrap()
                .push(extractor.get("traceparent").map(str::to_owned));
            self.inner.extract_with_context(cx, extractor)
        }

        fn fields(&self) -> FieldIter<'_> {
            self.inner.fields()
        }
    }

    fn counting_consumer(limit: u32) -> impl Consumer<Item = u32> {
        let next = Arc::new(AtomicU32::new(0));
        consumer_fn(move |ctx: Context| {
            let next = Arc::clone(&next);
            async move {
                let n = next.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= limit {
                    return Ok(n);
                }
                ctx.done().await;
                Err(NoItem)
            }
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_bounded_pool_processes_everything_once() {
        let ctx = Context::background();
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let processor = {
            let recorded = Arc::clone(&recorded);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let root = ctx.clone();
            processor_fn(move |_ctx: Context, n: u32| {
                let recorded = Arc::clone(&recorded);
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                let root = root.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    running.fetch_sub(1, Ordering::SeqCst);

                    let done = {
                        let mut seen = recorded.lock().unwrap();
                        seen.push(n);
                        seen.len() == 100
                    };
                    if done {
                        root.cancel();
                    }
                    Ok::<_, BoxError>(())
                }
            })
        };

        let rt = Concurrent::new(counting_consumer(100), processor)
            .with_max_concurrent_processors(3);
        tokio::time::timeout(Duration::from_secs(10), rt.run(ctx))
            .await
            .unwrap()
            .unwrap();

        let mut seen = recorded.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, (1..=100).collect::<Vec<_>>());
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {peak} exceeds cap");
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn test_no_item_and_worker_failures_are_tolerated() {
        let ctx = Context::background();
        let calls = Arc::new(AtomicU32::new(0));
        let processed = Arc::new(AtomicU32::new(0));

        let consumer = {
            let calls = Arc::clone(&calls);
            consumer_fn(move |_ctx: Context| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call % 2 == 0 {
                        Err(NoItem)
                    } else {
                        Ok(call)
                    }
                }
            })
        };
        let processor = {
            let processed = Arc::clone(&processed);
            let root = ctx.clone();
            processor_fn(move |_ctx: Context, v: u32| {
                let count = processed.fetch_add(1, Ordering::SeqCst) + 1;
                if count == 10 {
                    root.cancel();
                }
                async move {
                    if v == 3 {
                        panic!("poison message");
                    }
                    if v == 5 {
                        return Err(std::io::Error::other("rejected"));
                    }
                    Ok(())
                }
            })
        };

        let rec = Arc::new(Recorder::default());
        let rt = Concurrent::new(consumer, processor)
            .with_max_concurrent_processors(1)
            .with_subscribers(SubscriberSet::new(vec![rec.clone()]));
        tokio::time::timeout(Duration::from_secs(2), rt.run(ctx))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(processed.load(Ordering::SeqCst), 10);
        assert_eq!(rec.count(EventKind::PanicRecovered), 1);
        assert_eq!(rec.count(EventKind::ProcessFailed), 1);
        assert_eq!(rec.count(EventKind::ConsumeFailed), 0);
    }

    #[tokio::test]
    async fn test_trace_context_reaches_worker() {
        let trace_id = TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap();
        let span_id = SpanId::from_hex("00f067aa0ba902b7").unwrap();
        let remote = SpanContext::new(
            trace_id,
            span_id,
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );

        let root = Context::background();
        let ctx = root.with_trace_context(root.trace_context().with_remote_span_context(remote));
        let observed = Arc::new(Mutex::new(None));

        let processor = {
            let observed = Arc::clone(&observed);
            let stop = ctx.clone();
            processor_fn(move |item_ctx: Context, _n: u32| {
                let span = item_ctx.trace_context().span();
                let sc = span.span_context();
                *observed.lock().unwrap() = Some((sc.trace_id(), sc.span_id(), sc.is_remote()));
                stop.cancel();
                async { Ok::<_, BoxError>(()) }
            })
        };

        Concurrent::new(counting_consumer(1), processor)
            .run(ctx)
            .await
            .unwrap();

        assert_eq!(*observed.lock().unwrap(), Some((trace_id, span_id, true)));
    }

    #[tokio::test]
    async fn test_every_item_carries_its_trace_across_the_handoff() {
        let remote = SpanContext::new(
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap(),
            SpanId::from_hex("00f067aa0ba902b7").unwrap(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        let root = Context::background();
        let ctx = root.with_trace_context(root.trace_context().with_remote_span_context(remote));
        let propagator = Arc::new(RecordingPropagator::default());
        let processed = Arc::new(AtomicU32::new(0));

        let processor = {
            let processed = Arc::clone(&processed);
            let stop = ctx.clone();
            processor_fn(move |_ctx: Context, _n: u32| {
                if processed.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                    stop.cancel();
                }
                async { Ok::<_, BoxError>(()) }
            })
        };

        Concurrent::new(counting_consumer(3), processor)
            .with_max_concurrent_processors(1)
            .with_propagator(propagator.clone())
            .run(ctx)
            .await
            .unwrap();

        assert_eq!(processed.load(Ordering::SeqCst), 3);
        assert_eq!(propagator.injected.load(Ordering::SeqCst), 3);
        let extracted = propagator.extracted.lock().unwrap();
        assert_eq!(extracted.len(), 3);
        assert!(extracted.iter().all(|header| {
            header.as_deref() == Some("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")
        }));
    }

    #[tokio::test]
    async fn test_consume_errors_are_reported_and_retried() {
        let ctx = Context::background();
        let calls = Arc::new(AtomicU32::new(0));
        let processed = Arc::new(Mutex::new(Vec::new()));

        let consumer = {
            let calls = Arc::clone(&calls);
            consumer_fn(move |ctx: Context| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    match call {
                        0..3 => Err(BoxError::from(std::io::Error::other("broker unavailable"))),
                        3..5 => Ok(call),
                        _ => {
                            ctx.done().await;
                            Err(BoxError::from(NoItem))
                        }
                    }
                }
            })
        };
        let processor = {
            let processed = Arc::clone(&processed);
            let stop = ctx.clone();
            processor_fn(move |_ctx: Context, v: u32| {
                let mut seen = processed.lock().unwrap();
                seen.push(v);
                if seen.len() == 2 {
                    stop.cancel();
                }
                async { Ok::<_, BoxError>(()) }
            })
        };

        let rec = Arc::new(Recorder::default());
        Concurrent::new(consumer, processor)
            .with_max_concurrent_processors(1)
            .with_subscribers(SubscriberSet::new(vec![rec.clone()]))
            .run(ctx)
            .await
            .unwrap();

        assert_eq!(*processed.lock().unwrap(), vec![3, 4]);
        let seen = rec.seen.lock().unwrap();
        let failures: Vec<_> = seen
            .iter()
            .filter(|e| e.kind == EventKind::ConsumeFailed)
            .collect();
        assert_eq!(failures.len(), 3);
        assert!(failures.iter().all(|e| {
            e.stage == Some(Stage::Consume) && e.reason.as_deref() == Some("broker unavailable")
        }));
    }

    #[tokio::test]
    async fn test_consumer_panics_are_recovered() {
        let ctx = Context::background();
        let processed = Arc::new(AtomicU32::new(0));

        let consumer = consumer_fn(|_ctx: Context| async {
            if true {
                panic!("boom");
            }
            Ok::<u32, BoxError>(0)
        });
        let processor = {
            let processed = Arc::clone(&processed);
            processor_fn(move |_ctx: Context, _v: u32| {
                processed.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, BoxError>(()) }
            })
        };

        let rec = Arc::new(Recorder::default());
        let stopper = Arc::new(CancelAfter {
            ctx: ctx.clone(),
            kind: EventKind::PanicRecovered,
            after: 3,
            seen: AtomicUsize::new(0),
        });
        tokio::time::timeout(
            Duration::from_secs(2),
            Concurrent::new(consumer, processor)
                .with_subscribers(SubscriberSet::new(vec![rec.clone(), stopper]))
                .run(ctx),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(processed.load(Ordering::SeqCst), 0);
        let seen = rec.seen.lock().unwrap();
        let panics: Vec<_> = seen
            .iter()
            .filter(|e| e.kind == EventKind::PanicRecovered)
            .collect();
        assert_eq!(panics.len(), 3);
        assert!(panics.iter().all(|e| {
            e.stage == Some(Stage::Consume)
                && e.reason.as_deref() == Some("recovered from panic: boom")
        }));
    }

    #[tokio::test]
    async fn test_item_dropped_on_cancel_is_tagged_dispatch() {
        let ctx = Context::background();
        let rec = Arc::new(Recorder::default());
        let processor = processor_fn(|item_ctx: Context, _n: u32| async move {
            item_ctx.done().await;
            Ok::<_, BoxError>(())
        });

        let rt = Concurrent::new(counting_consumer(u32::MAX), processor)
            .with_max_concurrent_processors(1)
            .with_subscribers(SubscriberSet::new(vec![rec.clone()]));
        let handle = tokio::spawn(rt.run(ctx.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        ctx.cancel();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let seen = rec.seen.lock().unwrap();
        let dropped: Vec<_> = seen
            .iter()
            .filter(|e| e.kind == EventKind::ItemDropped)
            .collect();
        assert!(!dropped.is_empty());
        assert!(dropped.iter().all(|e| e.stage == Some(Stage::Dispatch)));
    }

    #[tokio::test]
    async fn test_cancel_while_saturated_returns() {
        let ctx = Context::background();
        let started = Arc::new(AtomicU32::new(0));

        let processor = {
            let started = Arc::clone(&started);
            processor_fn(move |item_ctx: Context, _n: u32| {
                started.fetch_add(1, Ordering::SeqCst);
                async move {
                    item_ctx.done().await;
                    Ok::<_, BoxError>(())
                }
            })
        };

        let rec = Arc::new(Recorder::default());
        let rt = Concurrent::new(counting_consumer(u32::MAX), processor)
            .with_max_concurrent_processors(2)
            .with_subscribers(SubscriberSet::new(vec![rec.clone()]));

        let handle = tokio::spawn(rt.run(ctx.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        ctx.cancel();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(started.load(Ordering::SeqCst), 2);
        assert_eq!(rec.count(EventKind::RuntimeStopped), 1);
    }
}
