//! Cache lookup and idempotent writes.

use chrono::{DateTime, Utc};
use ragloom_config::{AppConfig, CacheConfig};
use ragloom_core::{Completion, KvRecords, KvStore, StoreError};
use ragloom_telemetry::LogVerbosity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::key::{CacheKey, DEFAULT_MODE};

/// A persisted result, as stored under its flattened key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached result text
    #[serde(rename = "return")]
    pub value: String,

    /// What the result is for ("extract", "query", ...)
    #[serde(rename = "cache_type")]
    pub purpose: String,

    /// Chunk the call was made for, if any
    #[serde(rename = "chunk_id", default)]
    pub source_chunk_id: Option<String>,

    /// The logical input the hash was computed over
    #[serde(rename = "original_prompt", default)]
    pub original_input: String,

    /// Parameters of the call that produced the value
    #[serde(rename = "queryparam", default)]
    pub call_parameters: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A result offered to [`ResultCache::store`].
#[derive(Debug)]
pub struct CacheWrite<'a> {
    pub key: &'a CacheKey,
    pub value: &'a Completion,
    pub original_input: &'a str,
    pub source_chunk_id: Option<&'a str>,
    pub call_parameters: Option<Value>,
}

/// Why a write was skipped. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Caching is switched off for the key's mode.
    Disabled,
    /// The stored value is already identical.
    Duplicate,
    /// The value is a stream and cannot be persisted.
    Streaming,
    /// The value is empty text.
    Empty,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Duplicate => write!(f, "duplicate"),
            Self::Streaming => write!(f, "streaming"),
            Self::Empty => write!(f, "empty"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    Skipped(SkipReason),
}

impl StoreOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored)
    }
}

/// Maps `mode:purpose:hash` keys to previously computed results.
///
/// Enablement depends on the key's mode: the `default` mode is governed by
/// `enable_llm_cache_for_entity_extract`, every other mode by
/// `enable_llm_cache`. A disabled cache is a silent bypass.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn KvStore>,
    config: CacheConfig,
    verbosity: LogVerbosity,
}

impl ResultCache {
    pub fn new(store: Arc<dyn KvStore>, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            verbosity: LogVerbosity::default(),
        }
    }

    pub fn with_verbosity(mut self, verbosity: LogVerbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Cache settings and log verbosity taken from the application config.
    pub fn from_app_config(store: Arc<dyn KvStore>, config: &AppConfig) -> Self {
        Self::new(store, config.cache.clone())
            .with_verbosity(LogVerbosity::from_verbose(config.log.verbose))
    }

    pub fn verbosity(&self) -> LogVerbosity {
        self.verbosity
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Whether results for `mode` are read from and written to the cache.
    pub fn is_enabled_for(&self, mode: &str) -> bool {
        if mode == DEFAULT_MODE {
            self.config.enable_llm_cache_for_entity_extract
        } else {
            self.config.enable_llm_cache
        }
    }

    /// Fetch the entry stored under `key`.
    ///
    /// Disabled modes, missing keys, records that do not parse as entries
    /// and entries with an empty value are all misses.
    pub async fn lookup(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StoreError> {
        if !self.is_enabled_for(&key.mode) {
            return Ok(None);
        }

        let flat = key.to_string();
        let Some(record) = self.store.get_by_id(&flat).await? else {
            debug!(mode = %key.mode, purpose = %key.purpose, "Cache miss");
            return Ok(None);
        };

        match serde_json::from_value::<CacheEntry>(record) {
            Ok(entry) if !entry.value.is_empty() => {
                debug!(key = %flat, "Cache hit");
                Ok(Some(entry))
            }
            Ok(_) => Ok(None),
            Err(e) => {
                warn!(key = %flat, error = %e, "Ignoring unreadable cache record");
                Ok(None)
            }
        }
    }

    /// Persist a result unless it is disabled, streaming, empty, or unchanged.
    ///
    /// The unchanged check reads before writing and is not transactional:
    /// two identical concurrent writes may both land, which is harmless.
    pub async fn store(&self, write: CacheWrite<'_>) -> Result<StoreOutcome, StoreError> {
        if !self.is_enabled_for(&write.key.mode) {
            return Ok(StoreOutcome::Skipped(SkipReason::Disabled));
        }

        let value = match write.value {
            Completion::Stream(_) => {
                debug!("Streaming response, skipping cache");
                return Ok(StoreOutcome::Skipped(SkipReason::Streaming));
            }
            Completion::Text(text) if text.is_empty() => {
                return Ok(StoreOutcome::Skipped(SkipReason::Empty));
            }
            Completion::Text(text) => text,
        };

        let flat = write.key.to_string();
        if let Some(existing) = self.store.get_by_id(&flat).await? {
            if existing.get("return").and_then(Value::as_str) == Some(value.as_str()) {
                info!(key = %flat, "Cache content unchanged, skipping update");
                return Ok(StoreOutcome::Skipped(SkipReason::Duplicate));
            }
        }

        let entry = CacheEntry {
            value: value.clone(),
            purpose: write.key.purpose.clone(),
            source_chunk_id: write.source_chunk_id.map(str::to_string),
            original_input: write.original_input.to_string(),
            call_parameters: write.call_parameters,
            created_at: Some(Utc::now()),
        };

        info!(key = %flat, "Saving result to cache");
        self.verbosity.debug("cached value", value);
        self.store
            .upsert(KvRecords::from([(flat, serde_json::to_value(&entry)?)]))
            .await?;
        Ok(StoreOutcome::Stored)
    }
}
