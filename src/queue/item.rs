//! Items in flight between the producer and workers of
//! [`Concurrent`](super::Concurrent), with the serialized trace context.

use std::collections::HashMap;

use opentelemetry::propagation::TextMapPropagator;

use crate::context::Context;

/// A consumed value plus the trace carrier captured when it was consumed.
#[derive(Debug)]
pub(crate) struct Item<T> {
    pub(crate) value: T,
    pub(crate) carrier: HashMap<String, String>,
}

impl<T> Item<T> {
    /// Wraps `value`, injecting the trace context of `ctx` into the carrier.
    pub(crate) fn capture(value: T, ctx: &Context, propagator: &dyn TextMapPropagator) -> Self {
        let mut carrier = HashMap::new();
        propagator.inject_context(ctx.trace_context(), &mut carrier);
        Self { value, carrier }
    }

    /// Splits the item into its value and a context derived from `parent`
    /// carrying the extracted trace context.
    pub(crate) fn restore(self, parent: &Context, propagator: &dyn TextMapPropagator) -> (T, Context) {
        let trace = propagator.extract_with_context(parent.trace_context(), &self.carrier);
        (self.value, parent.with_trace_context(trace))
    }
}
