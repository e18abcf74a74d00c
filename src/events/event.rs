//! # Runtime events emitted by runners, groups and runtimes.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Runtime lifecycle**: a runtime started or stopped
//! - **Item events**: consume/process failures, recovered panics, dropped items
//! - **Shutdown events**: signals, shutdown requests, drain results
//! - **Subscriber events**: a subscriber panicked while handling an event
//!
//! Every kind maps to a fixed [`Level`] so log output stays consistent.
//!
//! ## Ordering guarantees
//! A [`SubscriberSet`](crate::subscribers::SubscriberSet) stamps every event it
//! delivers with a sequence number (`seq`) that increases monotonically across
//! all clones of that set. Events not yet emitted carry `seq = 0`.
//!
//! ## Example
//! ```rust
//! use runvisor::events::{Event, EventKind, Level, Stage};
//!
//! let ev = Event::new(EventKind::PanicRecovered)
//!     .with_runtime("orders")
//!     .with_stage(Stage::Consume)
//!     .with_reason("recovered from panic: boom");
//!
//! assert_eq!(ev.kind.level(), Level::Error);
//! assert_eq!(ev.runtime.as_deref(), Some("orders"));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Where in a queue runtime an event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Consume,
    Process,
    Dispatch,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Consume => "consume",
            Stage::Process => "process",
            Stage::Dispatch => "dispatch",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Runtime lifecycle ===
    /// A runtime entered its run loop.
    ///
    /// Sets: `runtime`.
    RuntimeStarting,

    /// A runtime left its run loop.
    ///
    /// Sets: `runtime`, `reason` (only when it stopped with an error).
    RuntimeStopped,

    // === Item events ===
    /// Consume returned an error other than `NoItem`.
    ///
    /// Sets: `runtime`, `stage = Consume`, `reason`.
    ConsumeFailed,

    /// Process returned an error.
    ///
    /// Sets: `runtime`, `stage = Process`, `reason`.
    ProcessFailed,

    /// A panic was recovered at an item or run boundary.
    ///
    /// Sets: `runtime`, `stage`, `reason` (`recovered from panic: ...`).
    PanicRecovered,

    /// A consumed item was dropped because the context was cancelled before
    /// it reached Process.
    ///
    /// Sets: `runtime`, `stage` (`Process` in `Sequential`, `Dispatch` in
    /// `Concurrent`).
    ItemDropped,

    /// Acknowledging an item failed.
    ///
    /// Sets: `runtime`, `reason`.
    AckFailed,

    // === Server events ===
    /// The HTTP runtime started accepting connections.
    ///
    /// Sets: `runtime`, `reason` (local address).
    ServerListening,

    /// Accepting or serving a connection failed.
    ///
    /// Sets: `runtime`, `reason`.
    ConnectionFailed,

    // === Shutdown events ===
    /// An OS signal was received.
    ///
    /// Sets: `reason` (signal name).
    SignalReceived,

    /// Cancellation observed; graceful shutdown starts.
    ///
    /// Sets: `runtime`, `timeout_ms`.
    ShutdownRequested,

    /// Graceful shutdown drained every in-flight unit of work.
    ///
    /// Sets: `runtime`.
    ShutdownCompleted,

    /// Graceful shutdown deadline passed with work still in flight.
    ///
    /// Sets: `runtime`, `timeout_ms`, `reason`.
    GraceExceeded,

    // === Subscriber events ===
    /// A subscriber panicked while handling an event.
    ///
    /// Sets: `runtime` (subscriber name), `reason` (panic info).
    SubscriberPanicked,
}

impl EventKind {
    /// Severity used when rendering this kind.
    pub fn level(&self) -> Level {
        match self {
            EventKind::ItemDropped => Level::Debug,
            EventKind::RuntimeStarting
            | EventKind::RuntimeStopped
            | EventKind::ServerListening
            | EventKind::SignalReceived
            | EventKind::ShutdownRequested
            | EventKind::ShutdownCompleted => Level::Info,
            EventKind::ConsumeFailed
            | EventKind::ConnectionFailed
            | EventKind::AckFailed
            | EventKind::GraceExceeded => Level::Warn,
            EventKind::ProcessFailed
            | EventKind::PanicRecovered
            | EventKind::SubscriberPanicked => Level::Error,
        }
    }

    /// Short stable label (kebab-case) for log lines.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::RuntimeStarting => "runtime-starting",
            EventKind::RuntimeStopped => "runtime-stopped",
            EventKind::ConsumeFailed => "consume-failed",
            EventKind::ProcessFailed => "process-failed",
            EventKind::PanicRecovered => "panic-recovered",
            EventKind::ItemDropped => "item-dropped",
            EventKind::AckFailed => "ack-failed",
            EventKind::ServerListening => "server-listening",
            EventKind::ConnectionFailed => "connection-failed",
            EventKind::SignalReceived => "signal-received",
            EventKind::ShutdownRequested => "shutdown-requested",
            EventKind::ShutdownCompleted => "shutdown-completed",
            EventKind::GraceExceeded => "grace-exceeded",
            EventKind::SubscriberPanicked => "subscriber-panicked",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: per-set monotonic sequence, assigned on emit
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Sequence number assigned by the delivering set (`0` before emit).
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the emitting runtime (or subscriber), if applicable.
    pub runtime: Option<Arc<str>>,
    /// Queue stage the event refers to.
    pub stage: Option<Stage>,
    /// Human-readable reason (errors, panic messages, addresses).
    pub reason: Option<Arc<str>>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: 0,
            at: SystemTime::now(),
            kind,
            runtime: None,
            stage: None,
            reason: None,
            timeout_ms: None,
        }
    }

    /// Attaches the emitting runtime name.
    #[inline]
    pub fn with_runtime(mut self, runtime: impl Into<Arc<str>>) -> Self {
        self.runtime = Some(runtime.into());
        self
    }

    /// Attaches the queue stage.
    #[inline]
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_runtime(subscriber)
            .with_reason(info)
    }
}
