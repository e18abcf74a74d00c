//! # OS signal handling.
//!
//! Provides [`Signal`], the identifiers accepted by
//! [`NotifyOnSignal`](super::NotifyOnSignal), and [`wait_for_signal`].
//!
//! ## Signals
//! **Unix platforms:**
//! - `Interrupt` → `SIGINT` (Ctrl-C in terminal)
//! - `Terminate` → `SIGTERM` (default kill signal, used by systemd/Kubernetes)
//! - `Quit` → `SIGQUIT`
//! - `Hangup` → `SIGHUP`
//!
//! **Windows platforms:**
//! - `Interrupt` via [`tokio::signal::ctrl_c`]; the other identifiers never fire.

use std::fmt;

use crate::error::Error;

/// An OS signal that can cancel a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Interrupt,
    Terminate,
    Quit,
    Hangup,
}

impl Signal {
    /// Conventional name of the signal.
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
            Signal::Quit => "SIGQUIT",
            Signal::Hangup => "SIGHUP",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Installed listeners for a set of signals.
///
/// Listeners exist for as long as this value does.
#[cfg(unix)]
pub(crate) struct Listeners {
    streams: Vec<(Signal, tokio::signal::unix::Signal)>,
}

#[cfg(unix)]
impl Listeners {
    /// Installs one listener per distinct signal.
    pub(crate) fn install(signals: &[Signal]) -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut streams: Vec<(Signal, tokio::signal::unix::Signal)> = Vec::new();
        for &sig in signals {
            if streams.iter().any(|(s, _)| *s == sig) {
                continue;
            }
            let kind = match sig {
                Signal::Interrupt => SignalKind::interrupt(),
                Signal::Terminate => SignalKind::terminate(),
                Signal::Quit => SignalKind::quit(),
                Signal::Hangup => SignalKind::hangup(),
            };
            streams.push((sig, signal(kind)?));
        }
        Ok(Self { streams })
    }

    /// Completes with the first signal received; never completes when empty.
    pub(crate) async fn recv(&mut self) -> Signal {
        if self.streams.is_empty() {
            return futures::future::pending().await;
        }
        let waits = self.streams.iter_mut().map(|(sig, stream)| {
            Box::pin(async move {
                stream.recv().await;
                *sig
            })
        });
        futures::future::select_all(waits).await.0
    }
}

#[cfg(not(unix))]
pub(crate) struct Listeners {
    interrupt: bool,
}

#[cfg(not(unix))]
impl Listeners {
    pub(crate) fn install(signals: &[Signal]) -> std::io::Result<Self> {
        Ok(Self {
            interrupt: signals.contains(&Signal::Interrupt),
        })
    }

    pub(crate) async fn recv(&mut self) -> Signal {
        if self.interrupt && tokio::signal::ctrl_c().await.is_ok() {
            return Signal::Interrupt;
        }
        futures::future::pending().await
    }
}

/// Waits for any of `signals`.
///
/// Each call creates independent signal listeners.
///
/// Returns the received signal, or [`Error::Signal`] if registration fails.
pub async fn wait_for_signal(signals: &[Signal]) -> Result<Signal, Error> {
    let mut listeners = Listeners::install(signals).map_err(Error::Signal)?;
    Ok(listeners.recv().await)
}
