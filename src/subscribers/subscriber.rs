//! # Event subscriber trait.
//!
//! Provides [`Subscribe`], the logger capability injected into runtimes.
//!
//! ## Architecture
//! ```text
//! runtime ── emit(&ctx, Event) ──► SubscriberSet ──► subscriber.on_event(&ctx, &Event)
//!                                                  └─► panic caught → EventKind::SubscriberPanicked
//! ```
//!
//! ## Rules
//! - Delivery is synchronous, on the emitting task.
//! - Implementations must be thread-safe: runtimes emit from many tasks at once.
//! - The [`Context`] is the one the event was observed under (trace context included).
//!
//! ## Example
//! ```rust
//! use runvisor::Context;
//! use runvisor::events::{Event, EventKind};
//! use runvisor::subscribers::Subscribe;
//!
//! struct CountFailures(std::sync::atomic::AtomicUsize);
//!
//! impl Subscribe for CountFailures {
//!     fn on_event(&self, _ctx: &Context, ev: &Event) {
//!         if matches!(ev.kind, EventKind::ProcessFailed) {
//!             self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "count-failures" }
//! }
//! ```

use crate::context::Context;
use crate::events::Event;

/// Event subscriber for runtime observability.
///
/// ### Implementation requirements
/// - Keep `on_event` short; it runs inline on the runtime's task.
/// - Handle errors internally; panics are caught but reported as `SubscriberPanicked`.
pub trait Subscribe: Send + Sync + 'static {
    /// Handles a single event.
    fn on_event(&self, ctx: &Context, event: &Event);

    /// Returns the subscriber name used in panic events.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose; override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
