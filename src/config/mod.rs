//! # Lazy configuration readers.
//!
//! Builders source their settings through [`Reader`]s evaluated at build time:
//!
//! ```rust
//! use std::time::Duration;
//! use runvisor::{Context, config::{self, Reader}};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let ctx = Context::background();
//! let grace = config::must_or(
//!     &ctx,
//!     Duration::from_secs(30),
//!     &config::env_duration("RUNVISOR_DOC_SHUTDOWN_TIMEOUT"),
//! ).await;
//! assert_eq!(grace, Duration::from_secs(30));
//! # }
//! ```

mod env;
mod reader;

pub use env::{InvalidDuration, env, env_duration, env_parse};
pub use reader::{ConfigError, Reader, must, must_or, or_all};
