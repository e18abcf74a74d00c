//! Environment variable sources.
//!
//! Missing and empty variables are both *unset*.

use std::str::FromStr;
use std::time::Duration;

use super::reader::{ConfigError, Reader};
use crate::error::BoxError;

/// Reads the raw value of environment variable `name`.
pub fn env(name: &str) -> Reader<String> {
    let name = name.to_string();
    Reader::from_fn(name.clone(), move |_ctx| {
        let res = match std::env::var(&name) {
            Ok(v) if v.is_empty() => Ok(None),
            Ok(v) => Ok(Some(v)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode {
                name: name.clone(),
            }),
        };
        async move { res }
    })
}

/// Reads environment variable `name` and parses it with [`FromStr`].
pub fn env_parse<T>(name: &str) -> Reader<T>
where
    T: FromStr + Send + 'static,
    T::Err: Into<BoxError> + 'static,
{
    env(name).try_map(|raw| raw.trim().parse::<T>())
}

/// Reads environment variable `name` as a duration.
///
/// Accepts plain seconds (`"30"`) or a value suffixed with `ms`, `s` or `m`.
pub fn env_duration(name: &str) -> Reader<Duration> {
    env(name).try_map(|raw| parse_duration(&raw))
}

/// A duration string that could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("invalid duration {0:?}: expected <n>, <n>ms, <n>s or <n>m")]
pub struct InvalidDuration(String);

fn parse_duration(raw: &str) -> Result<Duration, InvalidDuration> {
    let s = raw.trim();
    let invalid = || InvalidDuration(raw.to_string());

    let (digits, millis_per_unit) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60_000)
    } else {
        (s, 1_000)
    };

    let n = digits.trim().parse::<u64>().map_err(|_| invalid())?;
    Ok(Duration::from_millis(n.saturating_mul(millis_per_unit)))
}
