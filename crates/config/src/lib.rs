//! Configuration loading, validation, and management for ragloom.
//!
//! Loads configuration from `~/.ragloom/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Largest accepted `scheduler.max_queue_size`.
pub const MAX_QUEUE_SIZE: usize = 1 << 24;

/// The root configuration structure.
///
/// Maps directly to `~/.ragloom/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Concurrency limits for expensive calls
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Result cache switches
    #[serde(default)]
    pub cache: CacheConfig,

    /// Chunk selection defaults
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Logging behaviour
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of calls executing at once
    #[serde(default = "default_max_async")]
    pub max_async: usize,

    /// Maximum number of calls waiting for a worker
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Priority used when a caller does not pick one (lower runs first)
    #[serde(default = "default_priority")]
    pub default_priority: i64,

    /// How often an idle worker wakes to check for shutdown
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How often the worker pool is topped back up
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,

    /// How long shutdown waits for the queue to drain
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_max_async() -> usize {
    4
}
fn default_max_queue_size() -> usize {
    1000
}
fn default_priority() -> i64 {
    10
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_health_check_interval_ms() -> u64 {
    5000
}
fn default_shutdown_grace_ms() -> u64 {
    5000
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_async: default_max_async(),
            max_queue_size: default_max_queue_size(),
            default_priority: default_priority(),
            poll_interval_ms: default_poll_interval_ms(),
            health_check_interval_ms: default_health_check_interval_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache end-user query results (any mode other than "default")
    #[serde(default = "default_true")]
    pub enable_llm_cache: bool,

    /// Cache entity/relation extraction results (mode "default")
    #[serde(default = "default_true")]
    pub enable_llm_cache_for_entity_extract: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable_llm_cache: true,
            enable_llm_cache_for_entity_extract: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_true")]
    pub enable_rerank: bool,

    /// Chunks scoring below this after reranking are dropped (0 disables)
    #[serde(default = "default_min_rerank_score")]
    pub min_rerank_score: f32,

    /// Chunks kept after reranking. `0` in the file disables the cap.
    #[serde(default = "default_chunk_top_k", with = "top_k_cap")]
    pub chunk_top_k: Option<usize>,

    /// Token budget used when a request does not set its own
    #[serde(default = "default_max_total_tokens")]
    pub max_total_tokens: usize,

    /// Chunks requested for the most important entity/relation
    #[serde(default = "default_related_chunk_max")]
    pub related_chunk_max: usize,

    /// Chunks requested for the least important entity/relation
    #[serde(default = "default_related_chunk_min")]
    pub related_chunk_min: usize,
}

fn default_min_rerank_score() -> f32 {
    0.5
}
fn default_chunk_top_k() -> Option<usize> {
    Some(20)
}
/// `chunk_top_k` on disk: a plain integer where `0` means no cap.
mod top_k_cap {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<usize>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.unwrap_or(0) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<usize>, D::Error> {
        let k = usize::deserialize(deserializer)?;
        Ok((k > 0).then_some(k))
    }
}

fn default_max_total_tokens() -> usize {
    30_000
}
fn default_related_chunk_max() -> usize {
    5
}
fn default_related_chunk_min() -> usize {
    1
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enable_rerank: true,
            min_rerank_score: default_min_rerank_score(),
            chunk_top_k: default_chunk_top_k(),
            max_total_tokens: default_max_total_tokens(),
            related_chunk_max: default_related_chunk_max(),
            related_chunk_min: default_related_chunk_min(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log long debug payloads in full instead of summarising them
    #[serde(default)]
    pub verbose: bool,
}

impl AppConfig {
    /// Load configuration from the default path (~/.ragloom/config.toml),
    /// then apply `RAGLOOM_*` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ragloom")
    }

    /// Override settings from environment-style variables.
    ///
    /// `lookup` maps a variable name to its value; unparseable values are
    /// ignored with a warning and the existing setting is kept.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        env.read("RAGLOOM_MAX_ASYNC", &mut self.scheduler.max_async);
        env.read("RAGLOOM_MAX_QUEUE_SIZE", &mut self.scheduler.max_queue_size);
        env.read_bool("RAGLOOM_ENABLE_LLM_CACHE", &mut self.cache.enable_llm_cache);
        env.read_bool(
            "RAGLOOM_ENABLE_LLM_CACHE_FOR_EXTRACT",
            &mut self.cache.enable_llm_cache_for_entity_extract,
        );
        env.read_bool("RAGLOOM_ENABLE_RERANK", &mut self.retrieval.enable_rerank);
        env.read("RAGLOOM_MIN_RERANK_SCORE", &mut self.retrieval.min_rerank_score);
        env.read("RAGLOOM_MAX_TOTAL_TOKENS", &mut self.retrieval.max_total_tokens);
        env.read_optional("RAGLOOM_CHUNK_TOP_K", &mut self.retrieval.chunk_top_k);
        if self.retrieval.chunk_top_k == Some(0) {
            self.retrieval.chunk_top_k = None;
        }
        env.read_bool("RAGLOOM_VERBOSE", &mut self.log.verbose);
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scheduler;
        if s.max_async == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler.max_async must be at least 1".into(),
            ));
        }
        if s.max_queue_size == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler.max_queue_size must be at least 1".into(),
            ));
        }
        if s.max_queue_size > MAX_QUEUE_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "scheduler.max_queue_size must be at most {MAX_QUEUE_SIZE}"
            )));
        }
        if s.poll_interval_ms == 0 || s.health_check_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler intervals must be > 0".into(),
            ));
        }

        let r = &self.retrieval;
        if !(r.min_rerank_score >= 0.0) {
            return Err(ConfigError::ValidationError(
                "retrieval.min_rerank_score must be >= 0".into(),
            ));
        }
        if r.related_chunk_min > r.related_chunk_max {
            return Err(ConfigError::ValidationError(
                "retrieval.related_chunk_min must not exceed related_chunk_max".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Typed reads of environment-style variables.
struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn read<T: FromStr>(&self, key: &str, slot: &mut T) {
        let Some(raw) = (self.lookup)(key) else {
            return;
        };
        match raw.trim().parse() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!(key, value = %raw, "Ignoring unparseable environment override"),
        }
    }

    fn read_bool(&self, key: &str, slot: &mut bool) {
        if let Some(raw) = (self.lookup)(key) {
            *slot = parse_bool(&raw);
        }
    }

    /// Like `read`, but the literal `None` clears the setting.
    fn read_optional<T: FromStr>(&self, key: &str, slot: &mut Option<T>) {
        let Some(raw) = (self.lookup)(key) else {
            return;
        };
        if raw.trim() == "None" {
            *slot = None;
            return;
        }
        match raw.trim().parse() {
            Ok(value) => *slot = Some(value),
            Err(_) => tracing::warn!(key, value = %raw, "Ignoring unparseable environment override"),
        }
    }
}

/// `true`, `1`, `yes`, `t` and `on` (any case) are true; everything else is false.
pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "t" | "on"
    )
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.max_async, 4);
        assert_eq!(config.scheduler.max_queue_size, 1000);
        assert_eq!(config.scheduler.default_priority, 10);
        assert_eq!(config.retrieval.min_rerank_score, 0.5);
        assert_eq!(config.retrieval.chunk_top_k, Some(20));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.scheduler.max_async, config.scheduler.max_async);
        assert_eq!(parsed.retrieval.max_total_tokens, 30_000);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
[scheduler]
max_async = 8

[cache]
enable_llm_cache = false
"#,
        )
        .unwrap();
        assert_eq!(parsed.scheduler.max_async, 8);
        assert_eq!(parsed.scheduler.max_queue_size, 1000);
        assert!(!parsed.cache.enable_llm_cache);
        assert!(parsed.cache.enable_llm_cache_for_entity_extract);
    }

    #[test]
    fn zero_workers_rejected() {
        let mut config = AppConfig::default();
        config.scheduler.max_async = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_queue_rejected() {
        let mut config = AppConfig::default();
        config.scheduler.max_queue_size = MAX_QUEUE_SIZE;
        assert!(config.validate().is_ok());
        config.scheduler.max_queue_size = MAX_QUEUE_SIZE + 1;
        assert!(config.validate().is_err());
        config.scheduler.max_queue_size = usize::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn disabled_top_k_survives_show_and_reload() {
        let mut config = AppConfig::default();
        config.retrieval.chunk_top_k = None;
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("chunk_top_k = 0"));
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.retrieval.chunk_top_k, None);

        let parsed: AppConfig = toml::from_str("[retrieval]\nchunk_top_k = 0\n").unwrap();
        assert_eq!(parsed.retrieval.chunk_top_k, None);

        let mut config = AppConfig::default();
        config.apply_env_overrides(env(&[("RAGLOOM_CHUNK_TOP_K", "0")]));
        assert_eq!(config.retrieval.chunk_top_k, None);
    }

    #[test]
    fn inverted_related_chunk_bounds_rejected() {
        let mut config = AppConfig::default();
        config.retrieval.related_chunk_min = 9;
        config.retrieval.related_chunk_max = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_min_score_rejected() {
        let mut config = AppConfig::default();
        config.retrieval.min_rerank_score = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.scheduler.max_async, 4);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retrieval]\nchunk_top_k = 7\n").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.retrieval.chunk_top_k, Some(7));
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scheduler\n").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(env(&[
            ("RAGLOOM_MAX_ASYNC", "16"),
            ("RAGLOOM_ENABLE_LLM_CACHE", "off"),
            ("RAGLOOM_ENABLE_RERANK", "Yes"),
            ("RAGLOOM_MIN_RERANK_SCORE", "0.25"),
            ("RAGLOOM_CHUNK_TOP_K", "None"),
            ("RAGLOOM_VERBOSE", "1"),
        ]));
        assert_eq!(config.scheduler.max_async, 16);
        assert!(!config.cache.enable_llm_cache);
        assert!(config.retrieval.enable_rerank);
        assert_eq!(config.retrieval.min_rerank_score, 0.25);
        assert_eq!(config.retrieval.chunk_top_k, None);
        assert!(config.log.verbose);
    }

    #[test]
    fn unparseable_env_value_keeps_default() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(env(&[
            ("RAGLOOM_MAX_QUEUE_SIZE", "lots"),
            ("RAGLOOM_CHUNK_TOP_K", "ten"),
        ]));
        assert_eq!(config.scheduler.max_queue_size, 1000);
        assert_eq!(config.retrieval.chunk_top_k, Some(20));
    }

    #[test]
    fn bool_parsing() {
        for raw in ["true", "TRUE", "1", "yes", "t", "on"] {
            assert!(parse_bool(raw), "{raw} should be true");
        }
        for raw in ["false", "0", "no", "", "enabled"] {
            assert!(!parse_bool(raw), "{raw} should be false");
        }
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("max_async = 4"));
        assert!(toml_str.contains("enable_llm_cache = true"));
        assert!(toml_str.contains("chunk_top_k = 20"));
    }
}
