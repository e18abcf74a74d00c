//! # Application composition: Builder, App, Runner.
//!
//! ```text
//!          Builder ──build(ctx)──► App ──run(ctx)──► Result<(), Error>
//!             ▲                     ▲
//!             └──────── Runner ─────┘   (BuildAndRun + decorators)
//! ```
//!
//! - [`Builder`], [`from_fn`], [`BuilderExt`]: deferred construction
//! - [`App`], [`app_fn`], [`join`]: runnable units
//! - [`Runner`], [`BuildAndRun`], [`RecoverPanics`], [`NotifyOnSignal`], [`RunnerExt`]
//! - [`Signal`], [`wait_for_signal`]: OS signal identifiers
//! - [`Lifecycle`]: post-run hooks registered at build time

#[allow(clippy::module_inception)]
mod app;
mod builder;
mod lifecycle;
mod runner;
mod signals;

pub use app::{App, AppFn, Join, app_fn, join};
pub use builder::{AndThen, Builder, BuilderExt, BuilderFn, Map, from_fn};
pub use lifecycle::Lifecycle;
pub use runner::{BuildAndRun, NotifyOnSignal, RecoverPanics, Runner, RunnerExt, run};
pub use signals::{Signal, wait_for_signal};
