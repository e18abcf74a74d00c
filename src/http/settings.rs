//! # HTTP server settings.
//!
//! ## Sentinel values
//! - `Duration::ZERO` disables a timeout (`read_timeout`, `read_header_timeout`,
//!   `write_timeout`).
//! - `idle_timeout = 0s` disables HTTP/1 keep-alive.

use std::time::Duration;

/// Smallest read buffer hyper accepts for HTTP/1 connections.
const MIN_HTTP1_BUF: usize = 8192;

/// Timeouts and limits applied to every connection of an
/// [`HttpRuntime`](super::HttpRuntime).
///
/// ## Field semantics
/// - `read_timeout`: fallback for `read_header_timeout` when that one is `0s`
/// - `read_header_timeout`: time allowed to receive request headers (`0s` = none)
/// - `write_timeout`: per-request deadline; on expiry the connection is closed
///   without a response (`0s` = none)
/// - `idle_timeout`: `0s` disables HTTP/1 keep-alive; a positive value sets
///   the HTTP/2 keep-alive ping interval and ack timeout
/// - `max_header_bytes`: HTTP/1 read buffer limit (raised to 8 KiB at least)
/// - `disable_general_options_handler`: pass `OPTIONS *` to the router
///   instead of answering `200` directly
/// - `shutdown_timeout`: drain deadline once cancellation is observed
#[derive(Clone, Debug)]
pub struct ServerSettings {
    pub read_timeout: Duration,
    pub read_header_timeout: Duration,
    pub write_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_header_bytes: usize,
    pub disable_general_options_handler: bool,
    pub shutdown_timeout: Duration,
}

impl ServerSettings {
    /// Header read timeout, falling back to `read_timeout`.
    #[inline]
    pub fn header_read_timeout(&self) -> Option<Duration> {
        non_zero(self.read_header_timeout).or_else(|| non_zero(self.read_timeout))
    }

    /// Per-request deadline, if any.
    #[inline]
    pub fn write_deadline(&self) -> Option<Duration> {
        non_zero(self.write_timeout)
    }

    /// HTTP/2 keep-alive interval, or `None` when keep-alive is disabled.
    #[inline]
    pub fn keep_alive(&self) -> Option<Duration> {
        non_zero(self.idle_timeout)
    }

    /// HTTP/1 read buffer size, clamped to hyper's minimum.
    #[inline]
    pub fn http1_max_buf_size(&self) -> usize {
        self.max_header_bytes.max(MIN_HTTP1_BUF)
    }
}

fn non_zero(d: Duration) -> Option<Duration> {
    (!d.is_zero()).then_some(d)
}

impl Default for ServerSettings {
    /// Default settings:
    ///
    /// - no read or write timeout
    /// - `read_header_timeout = 10s`
    /// - `idle_timeout = 120s`
    /// - `max_header_bytes = 1 MiB`
    /// - `OPTIONS *` answered directly
    /// - `shutdown_timeout = 30s`
    fn default() -> Self {
        Self {
            read_timeout: Duration::ZERO,
            read_header_timeout: Duration::from_secs(10),
            write_timeout: Duration::ZERO,
            idle_timeout: Duration::from_secs(120),
            max_header_bytes: 1 << 20,
            disable_general_options_handler: false,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}
