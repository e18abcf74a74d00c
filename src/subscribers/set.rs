//! # SubscriberSet: inline fan-out over multiple subscribers
//!
//! [`SubscriberSet`] hands each [`Event`] to every subscriber in registration order.
//!
//! ## What it guarantees
//! - A panicking subscriber never reaches the emitter.
//! - Other subscribers still receive the event, followed by a
//!   `SubscriberPanicked` event naming the offender.
//! - An empty set discards everything (the silent default).
//! - Every delivered event, including `SubscriberPanicked`, is stamped with
//!   the next sequence number of the set; clones share the counter.
//!
//! ## Diagram
//! ```text
//!    emit(&ctx, Event) ──► seq stamped
//!        ├──► S1.on_event()
//!        ├──► S2.on_event()  ── panic ──► catch_unwind ──► Event::subscriber_panicked
//!        └──► SN.on_event()                                   │
//!                                                             └──► S1, SN (not S2)
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::Context;
use crate::events::Event;

use super::Subscribe;

/// Cloneable list of subscribers shared by every runtime task.
#[derive(Clone, Default)]
pub struct SubscriberSet {
    subs: Arc<[Arc<dyn Subscribe>]>,
    seq: Arc<AtomicU64>,
}

impl SubscriberSet {
    /// Creates a set from the given subscribers.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        Self {
            subs: subs.into(),
            seq: Arc::default(),
        }
    }

    /// Creates a set with a single subscriber.
    #[must_use]
    pub fn single(sub: impl Subscribe) -> Self {
        Self::new(vec![Arc::new(sub)])
    }

    /// Stamps `event` with the next sequence number and delivers it to
    /// every subscriber.
    pub fn emit(&self, ctx: &Context, event: Event) {
        if self.subs.is_empty() {
            return;
        }
        let event = self.stamp(event);
        for (idx, sub) in self.subs.iter().enumerate() {
            let delivered =
                std::panic::catch_unwind(AssertUnwindSafe(|| sub.on_event(ctx, &event)));
            if let Err(payload) = delivered {
                let info = crate::error::Error::from_panic(payload).to_string();
                self.report_panic(ctx, idx, Event::subscriber_panicked(sub.name(), info));
            }
        }
    }

    /// Publishes a panic event to every subscriber but the one that panicked.
    ///
    /// A second panic while reporting is only traced.
    fn report_panic(&self, ctx: &Context, culprit: usize, event: Event) {
        let event = self.stamp(event);
        for (idx, sub) in self.subs.iter().enumerate() {
            if idx == culprit {
                continue;
            }
            let delivered =
                std::panic::catch_unwind(AssertUnwindSafe(|| sub.on_event(ctx, &event)));
            if delivered.is_err() {
                tracing::error!(
                    subscriber = sub.name(),
                    "subscriber panicked while handling a subscriber panic"
                );
            }
        }
    }

    fn stamp(&self, mut event: Event) -> Event {
        event.seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        event
    }

    /// True if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subs.len()
    }
}

impl std::fmt::Debug for SubscriberSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.subs.iter().map(|s| s.name()))
            .finish()
    }
}
