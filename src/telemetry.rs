//! `tracing` bootstrap for binaries.
//!
//! Library code only emits through `tracing`; installing a subscriber is left
//! to the binary. [`init_subscriber`] is the one-line default used by the demos.

use tracing_subscriber::EnvFilter;

/// Installs a global `fmt` subscriber filtered by `RUST_LOG`.
///
/// Falls back to `runvisor=info` when `RUST_LOG` is unset or invalid.
/// Returns `false` when a global subscriber was already installed.
pub fn init_subscriber() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("runvisor=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
