//! # LogWriter: events as `tracing` records
//!
//! Renders every [`Event`] through `tracing` at the level of its kind. The
//! trace id of the emitting [`Context`] is attached when one is present, so
//! item failures can be correlated with the producer's trace.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  runvisor: runtime-starting runtime="orders" seq=0
//! WARN  runvisor: consume-failed runtime="orders" stage=consume reason="broker unavailable" seq=4
//! ERROR runvisor: process-failed runtime="orders" stage=process reason="bad payload" trace_id=4bf92f3577b34da6a3ce929d0e0e4736 seq=9
//! INFO  runvisor: shutdown-completed runtime="http" seq=12
//! ```

use opentelemetry::trace::TraceContextExt;

use crate::context::Context;
use crate::events::{Event, Level};
use crate::subscribers::Subscribe;

/// Subscriber writing events to the active `tracing` dispatcher.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

macro_rules! log_at {
    ($lvl:expr, $ev:expr, $trace_id:expr) => {
        tracing::event!(
            target: "runvisor",
            $lvl,
            runtime = $ev.runtime.as_deref(),
            stage = $ev.stage.map(|s| s.as_str()),
            reason = $ev.reason.as_deref(),
            timeout_ms = $ev.timeout_ms,
            trace_id = $trace_id.as_deref(),
            seq = $ev.seq,
            "{}",
            $ev.kind.as_label()
        )
    };
}

/// Returns the hex trace id of `ctx`, if it carries a valid span context.
pub(crate) fn trace_id(ctx: &Context) -> Option<String> {
    let span = ctx.trace_context().span();
    let sc = span.span_context();
    sc.is_valid().then(|| sc.trace_id().to_string())
}

impl Subscribe for LogWriter {
    fn on_event(&self, ctx: &Context, e: &Event) {
        let trace_id = trace_id(ctx);
        match e.kind.level() {
            Level::Debug => log_at!(tracing::Level::DEBUG, e, trace_id),
            Level::Info => log_at!(tracing::Level::INFO, e, trace_id),
            Level::Warn => log_at!(tracing::Level::WARN, e, trace_id),
            Level::Error => log_at!(tracing::Level::ERROR, e, trace_id),
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
