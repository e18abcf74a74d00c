//! Runtime events: the data model emitted to subscribers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Level`] severity derived from the kind
//! - [`Stage`] queue stage an item event refers to
//!
//! ## Quick reference
//! - **Publishers**: `Sequential`, `Concurrent`, `HttpRuntime`, `NotifyOnSignal`,
//!   `AtMostOnce`/`AtLeastOnce`, `SubscriberSet` (subscriber panics).
//! - **Consumers**: every [`Subscribe`](crate::subscribers::Subscribe)
//!   implementation in a [`SubscriberSet`](crate::subscribers::SubscriberSet).

mod event;

pub use event::{Event, EventKind, Level, Stage};
