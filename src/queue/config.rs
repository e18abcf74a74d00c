//! # Queue runtime configuration.
//!
//! ## Sentinel values
//! - `max_concurrent_processors = 0` → unbounded (no slot semaphore created)

/// Settings shared by [`Sequential`](super::Sequential) and
/// [`Concurrent`](super::Concurrent).
///
/// ## Field semantics
/// - `name`: runtime name attached to every emitted event
/// - `max_concurrent_processors`: Process invocations allowed to overlap
///   (`0` = unbounded; ignored by `Sequential`, which always runs one)
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Runtime name used in events and logs.
    pub name: String,

    /// Maximum number of overlapping Process calls.
    ///
    /// - `0` = unbounded
    /// - `n > 0` = at most `n` workers run simultaneously
    pub max_concurrent_processors: usize,
}

impl QueueConfig {
    /// Returns the worker concurrency limit as an `Option`.
    ///
    /// - `None` → unbounded
    /// - `Some(n)` → at most `n` concurrent Process calls
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent_processors == 0 {
            None
        } else {
            Some(self.max_concurrent_processors)
        }
    }
}

impl Default for QueueConfig {
    /// Default configuration:
    ///
    /// - `name = "queue"`
    /// - `max_concurrent_processors = 0` (unbounded)
    fn default() -> Self {
        Self {
            name: "queue".to_string(),
            max_concurrent_processors: 0,
        }
    }
}
