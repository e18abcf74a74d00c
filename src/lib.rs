//! # runvisor
//!
//! **Runvisor** is the composition core of a long-running server process:
//! build an application lazily, run it until it finishes or the process is
//! signalled, recover from panics, and tear it down with post-run hooks.
//! On top of that core it ships ready-made runtimes for queue consumption
//! and HTTP serving.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   app::run(builder)
//!        │
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │ NotifyOnSignal (SIGINT/SIGTERM ──► emit SignalReceived, cancel)   │
//! │  └─ RecoverPanics (panic ──► Error::Panic)                        │
//! │      └─ BuildAndRun                                               │
//! │           ├─► Lifecycle placed in the build context               │
//! │           ├─► Builder::build(ctx) ──► App                         │
//! │           ├─► App::run(ctx)                                       │
//! │           └─► post-run hooks (always, reverse order)              │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌────────────┐   ┌──────────────┐   ┌──────────────┐
//!   │ Sequential │   │  Concurrent  │   │ HttpRuntime  │   ... or any App
//!   │ (1 in      │   │ (producer +  │   │ (axum router,│
//!   │  flight)   │   │  worker pool)│   │  drain)      │
//!   └─────┬──────┘   └──────┬───────┘   └──────┬───────┘
//!         │ emit(&ctx, Event)                  │
//!         ▼                 ▼                  ▼
//!   ┌───────────────────────────────────────────────────┐
//!   │ SubscriberSet ──► LogWriter (tracing) / custom    │
//!   └───────────────────────────────────────────────────┘
//! ```
//!
//! ### Cancellation
//! ```text
//! Context::background()
//!   └─► NotifyOnSignal child ──► App ctx ──► group ctx ──► task / worker ctx
//!
//! signal ──► cancel() ──► every derived context is done
//!                         └─► runtimes stop taking work, drain, return Ok(())
//! ```
//!
//! ## Modules
//! | Area              | Description                                              | Key types                                   |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Context**       | Cancellation, deadlines, trace context, values           | [`Context`]                                 |
//! | **Errors**        | Typed errors, joins, panic recovery                      | [`Error`], [`BoxError`]                     |
//! | **Groups**        | Fail-fast concurrent tasks with optional limit           | [`group::TaskGroup`], [`group::wait`]       |
//! | **Composition**   | Builders, apps, runners, signals, post-run hooks         | [`app::Builder`], [`app::App`], [`app::Runner`] |
//! | **Configuration** | Lazy readers over env vars and constants                 | [`config::Reader`]                          |
//! | **Queues**        | Sequential and concurrent consume/process loops          | [`queue::Sequential`], [`queue::Concurrent`] |
//! | **HTTP**          | axum router served with timeouts and graceful drain      | [`http::HttpRuntime`]                       |
//! | **Events**        | Runtime events and the subscriber fan-out                | [`events::Event`], [`subscribers::Subscribe`] |
//!
//! ## Optional features
//! - `http` _(default)_: the [`http`] module.
//! - `fmt`: [`telemetry::init_subscriber`], a `tracing-subscriber` bootstrap.
//!
//! ## Example
//! ```rust
//! use runvisor::{BoxError, Context, app};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), runvisor::Error> {
//!     let builder = app::from_fn(|_ctx: Context| async {
//!         Ok::<_, BoxError>(app::app_fn(|ctx: Context| async move {
//!             ctx.cancel(); // a real app would serve until signalled
//!             Ok::<_, BoxError>(())
//!         }))
//!     });
//!
//!     app::run(builder).await
//! }
//! ```

mod context;
mod error;

pub mod app;
pub mod config;
pub mod events;
pub mod group;
pub mod queue;
pub mod subscribers;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "fmt")]
pub mod telemetry;

// ---- Public re-exports ----

pub use app::run;
pub use context::Context;
pub use error::{BoxError, Error};
