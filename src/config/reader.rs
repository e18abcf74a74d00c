//! # Reader: a lazy, composable configuration value.
//!
//! A [`Reader<T>`] is a function of a [`Context`] producing
//! `Result<Option<T>, ConfigError>`, where `None` means *unset* (distinct from
//! any zero value). Nothing is read until [`Reader::read`] is awaited; builders
//! do that at build time only.
//!
//! ```text
//! env("PORT").try_map(parse) ──┐
//!                              ├─► or ──► must_or(ctx, 8080, ·)
//! Reader::of(8080) ────────────┘
//! ```
//!
//! ## Rules
//! - `or` returns the first *set* value; the first hard error stops the chain.
//! - `map`/`try_map` transform a value without re-querying the source.
//! - `must` panics on error or unset; `must_or` panics on error only.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::context::Context;
use crate::error::BoxError;

/// Errors produced while reading configuration.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An environment variable holds bytes that are not valid unicode.
    #[error("environment variable {name} is not valid unicode")]
    NotUnicode {
        /// Variable name.
        name: String,
    },

    /// A value was present but could not be converted.
    #[error("invalid value for {key}: {source}")]
    Invalid {
        /// Describes where the value came from.
        key: Arc<str>,
        /// Conversion failure.
        #[source]
        source: BoxError,
    },

    /// A custom source failed.
    #[error("config source failed: {0}")]
    Source(#[source] BoxError),
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::NotUnicode { .. } => "config_not_unicode",
            ConfigError::Invalid { .. } => "config_invalid",
            ConfigError::Source(_) => "config_source_failed",
        }
    }
}

type ReadFn<T> =
    dyn Fn(Context) -> BoxFuture<'static, Result<Option<T>, ConfigError>> + Send + Sync;

/// Lazy configuration value.
pub struct Reader<T> {
    key: Arc<str>,
    read: Arc<ReadFn<T>>,
}

impl<T> Clone for Reader<T> {
    fn clone(&self) -> Self {
        Self {
            key: Arc::clone(&self.key),
            read: Arc::clone(&self.read),
        }
    }
}

impl<T> fmt::Debug for Reader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader").field("key", &self.key).finish()
    }
}

impl<T: Send + 'static> Reader<T> {
    /// Creates a reader from an async function.
    ///
    /// `key` describes the source in error and panic messages.
    pub fn from_fn<F, Fut>(key: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, ConfigError>> + Send + 'static,
    {
        Self {
            key: key.into(),
            read: Arc::new(move |ctx| f(ctx).boxed()),
        }
    }

    /// A constant, always-set value.
    pub fn of(value: T) -> Self
    where
        T: Clone + Sync,
    {
        Self::from_fn("constant", move |_ctx| {
            let value = value.clone();
            async move { Ok(Some(value)) }
        })
    }

    /// A reader that is always unset.
    pub fn unset() -> Self {
        Self::from_fn("unset", |_ctx| async { Ok(None) })
    }

    /// Describes the source of this reader.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Evaluates the reader.
    pub async fn read(&self, ctx: &Context) -> Result<Option<T>, ConfigError> {
        (self.read)(ctx.clone()).await
    }

    /// Falls back to `other` when this reader is unset.
    ///
    /// # Example
    /// ```
    /// use runvisor::{Context, config::{self, Reader}};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let port = config::env_parse::<u16>("RUNVISOR_DOC_UNSET_PORT").or(Reader::of(8080));
    /// assert_eq!(port.read(&Context::background()).await.unwrap(), Some(8080));
    /// # }
    /// ```
    pub fn or(self, other: Reader<T>) -> Reader<T> {
        let key = format!("{} | {}", self.key, other.key);
        Reader::from_fn(key, move |ctx: Context| {
            let first = self.clone();
            let second = other.clone();
            async move {
                match first.read(&ctx).await? {
                    Some(v) => Ok(Some(v)),
                    None => second.read(&ctx).await,
                }
            }
        })
    }

    /// Transforms a set value.
    pub fn map<U, F>(self, f: F) -> Reader<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let key = Arc::clone(&self.key);
        Reader::from_fn(key, move |ctx: Context| {
            let inner = self.clone();
            let f = Arc::clone(&f);
            async move { Ok(inner.read(&ctx).await?.map(|v| f(v))) }
        })
    }

    /// Transforms a set value with a fallible conversion.
    ///
    /// Conversion failures become [`ConfigError::Invalid`] carrying this reader's key.
    pub fn try_map<U, E, F>(self, f: F) -> Reader<U>
    where
        U: Send + 'static,
        E: Into<BoxError> + 'static,
        F: Fn(T) -> Result<U, E> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let key = Arc::clone(&self.key);
        Reader::from_fn(Arc::clone(&key), move |ctx: Context| {
            let inner = self.clone();
            let f = Arc::clone(&f);
            let key = Arc::clone(&key);
            async move {
                match inner.read(&ctx).await? {
                    None => Ok(None),
                    Some(v) => f(v).map(Some).map_err(|e| ConfigError::Invalid {
                        key,
                        source: e.into(),
                    }),
                }
            }
        })
    }
}

/// Returns the first set value among `readers`, in order.
///
/// An empty list is always unset.
pub fn or_all<T: Send + 'static>(readers: impl IntoIterator<Item = Reader<T>>) -> Reader<T> {
    readers
        .into_iter()
        .reduce(Reader::or)
        .unwrap_or_else(Reader::unset)
}

/// Forces evaluation; panics when the reader errors or is unset.
///
/// Meant for build time: the panic is recovered by the surrounding
/// [`RecoverPanics`](crate::app::RecoverPanics) runner or task group.
pub async fn must<T: Send + 'static>(ctx: &Context, reader: &Reader<T>) -> T {
    match reader.read(ctx).await {
        Ok(Some(v)) => v,
        Ok(None) => panic!("required config value {} is unset", reader.key()),
        Err(e) => panic!("{e}"),
    }
}

/// Forces evaluation; returns `default` when unset and panics on error.
pub async fn must_or<T: Send + 'static>(ctx: &Context, default: T, reader: &Reader<T>) -> T {
    match reader.read(ctx).await {
        Ok(Some(v)) => v,
        Ok(None) => default,
        Err(e) => panic!("{e}"),
    }
}
