//! Single consume / process steps shared by the queue runtimes.
//!
//! Both steps are recovery boundaries: errors and panics are turned into
//! events here and never travel further.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use super::ack::AckError;
use super::consumer::{Consumer, NoItem, Processor};
use crate::context::Context;
use crate::error::{BoxError, Error};
use crate::events::{EventKind, Stage};
use crate::subscribers::Reporter;

/// Outcome of one consume attempt.
pub(crate) enum Consumed<T> {
    Item(T),
    /// NoItem, a transient error or a recovered panic.
    Skip,
    Cancelled,
}

/// Calls `consume` once, raced against cancellation of `ctx`.
pub(crate) async fn consume_once<C: Consumer>(
    ctx: &Context,
    consumer: &C,
    reporter: &Reporter,
) -> Consumed<C::Item> {
    let attempt = AssertUnwindSafe(consumer.consume(ctx)).catch_unwind();
    tokio::select! {
        biased;
        _ = ctx.done() => Consumed::Cancelled,
        res = attempt => match res {
            Ok(Ok(item)) => Consumed::Item(item),
            Ok(Err(e)) if NoItem::is(&e) => Consumed::Skip,
            Ok(Err(e)) => {
                reporter.failed(ctx, EventKind::ConsumeFailed, Stage::Consume, &e);
                Consumed::Skip
            }
            Err(payload) => {
                let err = Error::from_panic(payload);
                reporter.failed(ctx, EventKind::PanicRecovered, Stage::Consume, &err);
                Consumed::Skip
            }
        },
    }
}

/// Calls `process` once. Returns `false` when it failed or panicked.
pub(crate) async fn process_once<T, P: Processor<T>>(
    ctx: &Context,
    processor: &P,
    item: T,
    reporter: &Reporter,
) -> bool {
    match AssertUnwindSafe(processor.process(ctx, item))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            reporter.failed(ctx, process_failure_kind(&e), Stage::Process, &e);
            false
        }
        Err(payload) => {
            let err = Error::from_panic(payload);
            reporter.failed(ctx, EventKind::PanicRecovered, Stage::Process, &err);
            false
        }
    }
}

fn process_failure_kind(err: &BoxError) -> EventKind {
    if err.is::<AckError>() {
        EventKind::AckFailed
    } else {
        EventKind::ProcessFailed
    }
}
