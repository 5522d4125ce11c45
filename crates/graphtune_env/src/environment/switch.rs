//! Typed switches over single environment variables.
//!
//! A [`Switch`] is read at every call; nothing is latched, so flipping a
//! variable between two reads changes what the second one sees.
//!
//! ```
//! use graphtune_env::GRAPH_CACHE_SIZE;
//!
//! let _size = GRAPH_CACHE_SIZE.scoped(&8);
//! assert_eq!(GRAPH_CACHE_SIZE.read().ok().flatten(), Some(8));
//! assert_eq!(GRAPH_CACHE_SIZE.read_or(32), 8);
//! ```

use std::{marker::PhantomData, path::PathBuf};

use tracing::Level;

use super::{EnvVar, Environment, scoped::ScopedEnv};

/// A variable was set to something its switch cannot interpret.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvVarError {
    #[error("invalid value '{value}' for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// A type that can be stored in an environment variable.
pub trait EnvValue: Sized {
    /// Parse a raw value, or say why it is not acceptable.
    fn decode(raw: &str) -> Result<Self, &'static str>;

    fn encode(&self) -> String;
}

impl EnvValue for bool {
    fn decode(raw: &str) -> Result<Self, &'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err("expected a boolean such as 1, 0, true or false"),
        }
    }

    fn encode(&self) -> String {
        String::from(if *self { "1" } else { "0" })
    }
}

impl EnvValue for usize {
    fn decode(raw: &str) -> Result<Self, &'static str> {
        raw.trim().parse().map_err(|_| "expected a non-negative integer")
    }

    fn encode(&self) -> String {
        self.to_string()
    }
}

impl EnvValue for Level {
    fn decode(raw: &str) -> Result<Self, &'static str> {
        raw.trim().parse().map_err(|_| "expected one of trace, debug, info, warn, error")
    }

    fn encode(&self) -> String {
        self.to_string().to_ascii_lowercase()
    }
}

impl EnvValue for PathBuf {
    fn decode(raw: &str) -> Result<Self, &'static str> {
        if raw.trim().is_empty() {
            return Err("path is empty");
        }
        Ok(PathBuf::from(raw))
    }

    fn encode(&self) -> String {
        self.to_string_lossy().into_owned()
    }
}

/// One environment variable interpreted as `T`.
pub struct Switch<T> {
    var: EnvVar,
    _value: PhantomData<fn() -> T>,
}

impl<T> Switch<T> {
    pub const fn new(var: EnvVar) -> Self {
        Self { var, _value: PhantomData }
    }

    pub const fn key(&self) -> &'static str {
        self.var.key()
    }

    pub const fn var(&self) -> EnvVar {
        self.var
    }
}

impl<T: EnvValue> Switch<T> {
    /// `Ok(None)` when unset; an error when set to something `T` rejects.
    pub fn read(&self) -> Result<Option<T>, EnvVarError> {
        let Some(raw) = Environment::get(self.var) else {
            return Ok(None);
        };
        T::decode(&raw).map(Some).map_err(|reason| EnvVarError::Invalid {
            name: self.key(),
            value: raw,
            reason,
        })
    }

    /// The current value, or `fallback` when unset. Invalid values also fall
    /// back, with a warning naming the variable.
    pub fn read_or(&self, fallback: T) -> T {
        match self.read() {
            Ok(value) => value.unwrap_or(fallback),
            Err(error) => {
                tracing::warn!(%error, "ignoring environment override");
                fallback
            }
        }
    }

    /// Set the variable to `value` until the returned guard drops.
    pub fn scoped(&self, value: &T) -> ScopedEnv {
        ScopedEnv::apply(self.var, Some(&value.encode()))
    }

    /// Set the variable to an arbitrary string, valid for `T` or not.
    pub fn scoped_raw(&self, raw: &str) -> ScopedEnv {
        ScopedEnv::apply(self.var, Some(raw))
    }

    /// Remove the variable until the returned guard drops.
    pub fn scoped_unset(&self) -> ScopedEnv {
        ScopedEnv::apply(self.var, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_accept_common_spellings() {
        for raw in ["1", "true", "YES", " on "] {
            assert_eq!(bool::decode(raw), Ok(true), "{raw}");
        }
        for raw in ["0", "false", "No", "off", ""] {
            assert_eq!(bool::decode(raw), Ok(false), "{raw}");
        }
        assert!(bool::decode("maybe").is_err());
        assert_eq!(true.encode(), "1");
    }

    #[test]
    fn levels_encode_in_a_form_they_decode_from() {
        for level in [Level::TRACE, Level::DEBUG, Level::INFO, Level::WARN, Level::ERROR] {
            assert_eq!(Level::decode(&level.encode()), Ok(level));
        }
        assert!(Level::decode("verbose").is_err());
    }

    #[test]
    fn sizes_and_paths_reject_junk() {
        assert_eq!(usize::decode(" 16 "), Ok(16));
        assert!(usize::decode("-1").is_err());
        assert!(PathBuf::decode("  ").is_err());
        assert_eq!(PathBuf::decode("/tmp/m.jsonl"), Ok(PathBuf::from("/tmp/m.jsonl")));
    }
}
