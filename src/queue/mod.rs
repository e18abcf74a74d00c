//! # Queue processing runtimes.
//!
//! Two [`App`](crate::app::App)s turning a [`Consumer`] and a [`Processor`]
//! into a long-running pipeline:
//!
//! - [`Sequential`]: strict consume→process pairs, one item in flight.
//! - [`Concurrent`]: producer + dispatcher + bounded worker pool, with the
//!   trace context carried from consumption to processing.
//!
//! Both recover from consumer/processor errors and panics per item, report
//! them through a [`SubscriberSet`](crate::subscribers::SubscriberSet), and
//! stop only on cancellation, returning `Ok(())`.
//!
//! Sources with explicit acknowledgement wrap their processor in
//! [`AtMostOnce`] or [`AtLeastOnce`].

mod ack;
mod concurrent;
mod config;
mod consumer;
mod handoff;
mod item;
mod sequential;
mod step;

pub use ack::{AckError, Acknowledger, AtLeastOnce, AtMostOnce};
pub use concurrent::{Concurrent, Propagator};
pub use config::QueueConfig;
pub use consumer::{Consumer, ConsumerFn, NoItem, Processor, ProcessorFn, consumer_fn, processor_fn};
pub use sequential::Sequential;
