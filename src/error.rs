//! Error types used by the runvisor runtimes.
//!
//! - [`Error`]: every failure surfaced by a runtime, group or runner.
//! - [`BoxError`]: the erased error type returned by user code (builders,
//!   consumers, processors and tasks).
//!
//! [`Error`] provides helper methods (`as_label`, `is_benign`, `contains`) for
//! logging and for inspecting joined errors.

use std::any::Any;
use std::fmt::Write as _;
use std::time::Duration;

use thiserror::Error;

/// Type-erased error returned by user-supplied code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Errors produced by runvisor.
///
/// Cancellation observed cleanly (`Canceled`) and the HTTP `ServerClosed`
/// sentinel are *benign*: top-level runtimes map them to `Ok(())`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// The context was cancelled.
    #[error("context canceled")]
    Canceled,

    /// The context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// A panic with a non-error payload was recovered.
    #[error("recovered from panic: {message}")]
    Panic {
        /// Rendered panic payload.
        message: String,
    },

    /// A task, consumer, or processor returned an error.
    ///
    /// Display and `source` are forwarded to the wrapped error.
    #[error(transparent)]
    Task(BoxError),

    /// Several errors joined together (order unspecified).
    #[error("{}", render_joined(.0))]
    Joined(Vec<Error>),

    /// A builder failed to produce its value.
    #[error("build failed: {0}")]
    Build(#[source] BoxError),

    /// Installing an OS signal listener failed.
    #[error("failed to listen for signals: {0}")]
    Signal(#[source] std::io::Error),

    /// The server stopped accepting connections because of an I/O error.
    #[error("serve failed: {0}")]
    Serve(#[source] std::io::Error),

    /// The server was closed by a shutdown request.
    #[error("server closed")]
    ServerClosed,

    /// Graceful shutdown did not drain all connections in time.
    #[error("shutdown timeout {grace:?} exceeded; {open} connection(s) still open")]
    ShutdownTimeout {
        /// The configured shutdown deadline.
        grace: Duration,
        /// Connections that were still open when the deadline passed.
        open: usize,
    },

    /// A request handler did not finish within the write timeout.
    #[error("handler exceeded write timeout {0:?}")]
    WriteTimeout(Duration),
}

impl Error {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use runvisor::Error;
    ///
    /// assert_eq!(Error::Canceled.as_label(), "context_canceled");
    /// assert_eq!(Error::ServerClosed.as_label(), "server_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::Canceled => "context_canceled",
            Error::DeadlineExceeded => "context_deadline_exceeded",
            Error::Panic { .. } => "panic_recovered",
            Error::Task(_) => "task_failed",
            Error::Joined(_) => "joined",
            Error::Build(_) => "build_failed",
            Error::Signal(_) => "signal_listen_failed",
            Error::Serve(_) => "serve_failed",
            Error::ServerClosed => "server_closed",
            Error::ShutdownTimeout { .. } => "shutdown_timeout",
            Error::WriteTimeout(_) => "write_timeout",
        }
    }

    /// Reports whether this error only records an intentional stop.
    ///
    /// A joined error is benign when every member is.
    pub fn is_benign(&self) -> bool {
        match self {
            Error::Canceled | Error::ServerClosed => true,
            Error::Joined(errs) => errs.iter().all(Error::is_benign),
            _ => false,
        }
    }

    /// Wraps an erased error, unwrapping it when it already is an [`Error`].
    pub fn from_boxed(err: BoxError) -> Self {
        match err.downcast::<Error>() {
            Ok(own) => *own,
            Err(other) => Error::Task(other),
        }
    }

    /// Converts a recovered panic payload into an error.
    ///
    /// Payloads recognised as errors are used directly:
    /// - an [`Error`]
    /// - a [`BoxError`], e.g. `std::panic::panic_any(BoxError::from(err))`
    /// - a `std::io::Error`
    ///
    /// String payloads (`panic!("...")`) become [`Error::Panic`]. Any other
    /// concrete type cannot be recognised once erased to `dyn Any`; code that
    /// panics with a custom error should box it as a [`BoxError`] first.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<Error>() {
            Ok(err) => return *err,
            Err(p) => p,
        };
        let payload = match payload.downcast::<BoxError>() {
            Ok(err) => return Error::from_boxed(*err),
            Err(p) => p,
        };
        let payload = match payload.downcast::<std::io::Error>() {
            Ok(err) => return Error::Task(err),
            Err(p) => p,
        };
        let message = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Error::Panic { message }
    }

    /// Joins errors: `None` when empty, the single error unwrapped when alone.
    pub fn join(mut errs: Vec<Error>) -> Option<Self> {
        match errs.len() {
            0 => None,
            1 => errs.pop(),
            _ => Some(Error::Joined(errs)),
        }
    }

    /// Drops benign members from a (possibly joined) error.
    pub fn without_benign(self) -> Option<Self> {
        match self {
            Error::Joined(errs) => Error::join(
                errs.into_iter()
                    .filter_map(Error::without_benign)
                    .collect(),
            ),
            e if e.is_benign() => None,
            e => Some(e),
        }
    }

    /// Iterates over the leaf errors (flattening [`Error::Joined`]).
    pub fn leaves(&self) -> Vec<&Error> {
        match self {
            Error::Joined(errs) => errs.iter().flat_map(Error::leaves).collect(),
            other => vec![other],
        }
    }

    /// Reports whether any leaf, or any error in a leaf's source chain, is an `E`.
    ///
    /// The chain of an [`Error::Task`] starts at the wrapped error.
    ///
    /// # Example
    /// ```
    /// use runvisor::Error;
    ///
    /// let err = Error::Joined(vec![
    ///     Error::Canceled,
    ///     Error::Task(std::io::Error::other("disk").into()),
    /// ]);
    /// assert!(err.contains::<std::io::Error>());
    /// ```
    pub fn contains<E: std::error::Error + 'static>(&self) -> bool {
        self.leaves().into_iter().any(|leaf| {
            if (leaf as &(dyn std::error::Error + 'static)).is::<E>() {
                return true;
            }
            let mut cur: Option<&(dyn std::error::Error + 'static)> = match leaf {
                Error::Task(inner) => Some(&**inner),
                other => std::error::Error::source(other),
            };
            while let Some(e) = cur {
                if e.is::<E>() {
                    return true;
                }
                cur = e.source();
            }
            false
        })
    }
}

fn render_joined(errs: &[Error]) -> String {
    let mut out = String::new();
    for (i, e) in errs.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{e}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    #[derive(Debug, Error)]
    #[error("flush failed")]
    struct Flush(#[source] Boom);

    fn chain(err: &Error) -> Vec<String> {
        let mut out = vec![err.to_string()];
        let mut cur = std::error::Error::source(err);
        while let Some(e) = cur {
            out.push(e.to_string());
            cur = e.source();
        }
        out
    }

    #[test]
    fn test_panic_with_str_payload() {
        let err = Error::from_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "recovered from panic: boom");
        assert_eq!(err.as_label(), "panic_recovered");
    }

    #[test]
    fn test_panic_with_error_payload_is_used_directly() {
        let payload: BoxError = Box::new(Boom);
        let err = Error::from_panic(Box::new(payload));
        assert!(matches!(err, Error::Task(_)));
        assert!(err.contains::<Boom>());
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_panic_with_io_error_payload_keeps_it() {
        let payload = std::io::Error::other("disk gone");
        let err = Error::from_panic(Box::new(payload));
        assert!(err.contains::<std::io::Error>());
        assert_eq!(err.to_string(), "disk gone");
    }

    #[test]
    fn test_panic_with_unknown_payload_type() {
        let err = Error::from_panic(Box::new(42_u8));
        assert_eq!(err.to_string(), "recovered from panic: non-string panic payload");
    }

    #[test]
    fn test_task_error_chain_has_no_duplicates() {
        let err = Error::Task(Box::new(Flush(Boom)));
        assert_eq!(chain(&err), vec!["flush failed", "boom"]);
        assert!(err.contains::<Flush>());
        assert!(err.contains::<Boom>());

        let plain = Error::Task(Box::new(Boom));
        assert_eq!(chain(&plain), vec!["boom"]);
    }

    #[test]
    fn test_panic_with_own_error_payload() {
        let err = Error::from_panic(Box::new(Error::DeadlineExceeded));
        assert!(matches!(err, Error::DeadlineExceeded));
    }

    #[test]
    fn test_from_boxed_unwraps_own_error() {
        let boxed: BoxError = Box::new(Error::ServerClosed);
        assert!(matches!(Error::from_boxed(boxed), Error::ServerClosed));
    }

    #[test]
    fn test_join_shapes() {
        assert!(Error::join(vec![]).is_none());
        assert!(matches!(
            Error::join(vec![Error::Canceled]),
            Some(Error::Canceled)
        ));
        let joined = Error::join(vec![Error::Canceled, Error::ServerClosed]).unwrap();
        assert_eq!(joined.to_string(), "context canceled\nserver closed");
    }

    #[test]
    fn test_without_benign() {
        let only_benign = Error::Joined(vec![Error::Canceled, Error::ServerClosed]);
        assert!(only_benign.is_benign());
        assert!(only_benign.without_benign().is_none());

        let mixed = Error::Joined(vec![Error::ServerClosed, Error::Task(Box::new(Boom))]);
        let rest = mixed.without_benign().unwrap();
        assert!(matches!(rest, Error::Task(_)));
    }

    #[test]
    fn test_contains_walks_nested_joins() {
        let err = Error::Joined(vec![
            Error::Canceled,
            Error::Joined(vec![Error::Build(Box::new(Boom))]),
        ]);
        assert!(err.contains::<Boom>());
        assert!(!err.contains::<std::io::Error>());
    }
}
