//! Environment Configuration Helpers
//!
//! Small typed accessors over process environment variables, so that every
//! crate's `from_env()` reports missing or malformed settings the same way.

use std::str::FromStr;

use thiserror::Error;

/// Environment lookup / parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    /// Required variable is unset or empty
    #[error("{0} must be set")]
    Missing(String),

    /// Variable is set but cannot be parsed
    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: String, reason: String },
}

/// Read a required variable. Empty values count as missing.
pub fn required(name: &str) -> Result<String, EnvError> {
    optional(name).ok_or_else(|| EnvError::Missing(name.to_string()))
}

/// Read an optional variable. Empty values count as unset.
pub fn optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an optional variable, falling back to `default` when unset.
pub fn parse_or<T>(name: &str, default: T) -> Result<T, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| EnvError::Invalid {
            name: name.to_string(),
            reason: e.to_string(),
        }),
    }
}
