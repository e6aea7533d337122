//! Flattened cache keys.

use ragloom_core::{KeyError, Message, compute_args_hash};
use std::fmt;
use std::str::FromStr;

/// Mode used for ingestion-time calls (entity/relation extraction).
pub const DEFAULT_MODE: &str = "default";

/// A `mode:purpose:hash` cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub mode: String,
    pub purpose: String,
    pub hash: String,
}

impl CacheKey {
    /// Build a key from parts already known to be valid.
    ///
    /// Use [`try_new`](Self::try_new) for caller-supplied parts.
    pub fn new(
        mode: impl Into<String>,
        purpose: impl Into<String>,
        hash: impl Into<String>,
    ) -> Self {
        let key = Self {
            mode: mode.into(),
            purpose: purpose.into(),
            hash: hash.into(),
        };
        debug_assert!(key.check().is_ok(), "invalid cache key {key}");
        key
    }

    /// Build a key, rejecting parts that would not survive a round trip
    /// through the flattened form: empty parts, or a colon in the mode or
    /// purpose.
    pub fn try_new(
        mode: impl Into<String>,
        purpose: impl Into<String>,
        hash: impl Into<String>,
    ) -> Result<Self, KeyError> {
        let key = Self {
            mode: mode.into(),
            purpose: purpose.into(),
            hash: hash.into(),
        };
        key.check()?;
        Ok(key)
    }

    fn check(&self) -> Result<(), KeyError> {
        for (name, value) in [
            ("mode", &self.mode),
            ("purpose", &self.purpose),
            ("hash", &self.hash),
        ] {
            if value.is_empty() {
                return Err(KeyError::EmptyComponent(name));
            }
        }
        if self.mode.contains(':') || self.purpose.contains(':') {
            return Err(KeyError::Malformed(self.to_string()));
        }
        Ok(())
    }

    /// Key for a call whose logical input is `input`.
    pub fn for_input(mode: &str, purpose: &str, input: &str) -> Self {
        Self::new(mode, purpose, compute_args_hash(&[input]))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.mode, self.purpose, self.hash)
    }
}

impl FromStr for CacheKey {
    type Err = KeyError;

    /// Splits on the first two colons; the hash keeps any further colons.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (Some(mode), Some(purpose), Some(hash)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(KeyError::Malformed(s.to_string()));
        };
        Self::try_new(mode, purpose, hash)
    }
}

/// The text a call's cache hash is computed over.
///
/// Prior history, when present, is serialized as JSON and joined to the
/// prompt with a newline; otherwise the prompt is used alone.
pub fn logical_input(prompt: &str, history: &[Message]) -> Result<String, serde_json::Error> {
    if history.is_empty() {
        return Ok(prompt.to_string());
    }
    let history = serde_json::to_string(history)?;
    Ok(format!("{history}\n{prompt}"))
}
