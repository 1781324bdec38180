// SPDX-License-Identifier: Apache-2.0

use std::error::Error;
use std::str::FromStr;
use std::time::Duration;
use tower::BoxError;

/// A tunable that can be switched off with `-1` or `unbounded`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit<T> {
    Bounded(T),
    Unbounded,
}

impl<T> Limit<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Limit::Bounded(v) => Some(v),
            Limit::Unbounded => None,
        }
    }
}

fn is_unbounded(s: &str) -> bool {
    let s = s.trim();
    s == "-1" || s.eq_ignore_ascii_case("unbounded") || s.eq_ignore_ascii_case("disabled")
}

/// Parse a numeric limit
pub fn parse_limit<T>(s: &str) -> Result<Limit<T>, BoxError>
where
    T: FromStr,
    T::Err: Error + Send + Sync + 'static,
{
    if is_unbounded(s) {
        return Ok(Limit::Unbounded);
    }
    s.trim()
        .parse()
        .map(Limit::Bounded)
        .map_err(|e| format!("invalid limit `{}`: {}", s, e).into())
}

pub fn parse_count(s: &str) -> Result<Limit<usize>, BoxError> {
    parse_limit(s)
}

pub fn parse_tries(s: &str) -> Result<Limit<u32>, BoxError> {
    parse_limit(s)
}

/// Parse a humantime duration, e.g. `1s` or `250ms`
pub fn parse_duration(s: &str) -> Result<Duration, BoxError> {
    Ok(humantime::parse_duration(s.trim())?)
}

/// Parse a humantime duration that may be disabled
pub fn parse_interval(s: &str) -> Result<Limit<Duration>, BoxError> {
    if is_unbounded(s) {
        return Ok(Limit::Unbounded);
    }
    parse_duration(s).map(Limit::Bounded)
}
