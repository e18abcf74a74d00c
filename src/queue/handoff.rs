//! # Hand-off: a zero-buffer rendezvous channel.
//!
//! `send` completes only once the receiver has taken the value, so a busy
//! receiver backpressures the sender and nothing queues up in between.
//!
//! ```text
//! send(v) ──► mpsc(1) slot ──► recv() ──► ack ──► send returns Ok
//!   ▲                                              │
//!   └───────────── blocked until here ─────────────┘
//! ```
//!
//! ## Rules
//! - Single producer: the slot is always empty when `send` starts.
//! - Dropping the sender closes the channel; `recv` then returns `None`.
//! - A value still in the slot when the receiver goes away is dropped and
//!   `send` reports [`Closed`].

use tokio::sync::{mpsc, oneshot};

/// The receiving side is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("hand-off receiver closed")]
pub(crate) struct Closed;

pub(crate) struct Sender<T> {
    slot: mpsc::Sender<(T, oneshot::Sender<()>)>,
}

pub(crate) struct Receiver<T> {
    slot: mpsc::Receiver<(T, oneshot::Sender<()>)>,
}

/// Creates a connected rendezvous pair.
pub(crate) fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = mpsc::channel(1);
    (Sender { slot: tx }, Receiver { slot: rx })
}

impl<T> Sender<T> {
    /// Hands `value` over, waiting until the receiver has taken it.
    pub(crate) async fn send(&self, value: T) -> Result<(), Closed> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.slot.send((value, ack_tx)).await.map_err(|_| Closed)?;
        ack_rx.await.map_err(|_| Closed)
    }
}

impl<T> Receiver<T> {
    /// Takes the next value; `None` once the sender is dropped.
    pub(crate) async fn recv(&mut self) -> Option<T> {
        let (value, ack) = self.slot.recv().await?;
        let _ = ack.send(());
        Some(value)
    }
}
