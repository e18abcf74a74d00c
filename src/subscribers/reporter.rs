//! Event emission on behalf of one named runtime.

use std::fmt::Display;
use std::sync::Arc;

use super::SubscriberSet;
use crate::context::Context;
use crate::events::{Event, EventKind, Stage};

/// Stamps events with a runtime name and hands them to a [`SubscriberSet`].
#[derive(Clone, Debug)]
pub(crate) struct Reporter {
    runtime: Arc<str>,
    subscribers: SubscriberSet,
}

impl Reporter {
    pub(crate) fn new(runtime: impl Into<Arc<str>>, subscribers: SubscriberSet) -> Self {
        Self {
            runtime: runtime.into(),
            subscribers,
        }
    }

    pub(crate) fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_runtime(Arc::clone(&self.runtime))
    }

    pub(crate) fn emit(&self, ctx: &Context, event: Event) {
        self.subscribers.emit(ctx, event);
    }

    pub(crate) fn failed(&self, ctx: &Context, kind: EventKind, stage: Stage, err: &dyn Display) {
        self.emit(
            ctx,
            self.event(kind).with_stage(stage).with_reason(err.to_string()),
        );
    }
}
