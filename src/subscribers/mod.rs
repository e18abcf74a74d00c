//! # Event subscribers: the logger capability.
//!
//! Runtimes never log directly. They emit [`Event`](crate::events::Event)s to
//! a [`SubscriberSet`] injected at construction; an empty set keeps them silent.
//!
//! ## Architecture
//! ```text
//!   Sequential / Concurrent / HttpRuntime / NotifyOnSignal
//!        │ emit(&ctx, Event)
//!        ▼
//!   SubscriberSet ──┬──► LogWriter (tracing)
//!                   ├──► custom metrics / alerts
//!                   └──► ...
//! ```
//!
//! - [`Subscribe`]: the extension trait
//! - [`SubscriberSet`]: panic-isolating fan-out
//! - [`LogWriter`]: built-in `tracing` writer

mod log;
mod reporter;
mod set;
mod subscriber;

pub use log::LogWriter;
pub(crate) use reporter::Reporter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;

#[cfg(test)]
pub(crate) use set::tests::Recorder;
