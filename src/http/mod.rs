//! # HTTP server runtime.
//!
//! [`HttpRuntime`] serves an axum [`Router`](axum::Router) on a bound
//! listener with per-connection timeouts from [`ServerSettings`], and drains
//! open connections within `shutdown_timeout` once its context is cancelled.
//!
//! Available with the `http` feature (enabled by default).

mod runtime;
mod server;
mod settings;

pub use runtime::HttpRuntime;
pub use settings::ServerSettings;
