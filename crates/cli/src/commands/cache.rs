//! `ragloom cache`: inspect a JSON-file result cache.

use ragloom_cache::{CacheKey, ResultCache};
use ragloom_config::AppConfig;
use ragloom_core::KvStore;
use ragloom_storage::JsonFileKvStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Namespace of the default result-cache file.
pub const CACHE_NAMESPACE: &str = "llm_response_cache";

/// The result cache as configured, with `--verbose` forcing full payload logging.
pub fn build_cache(
    store: Arc<dyn KvStore>,
    mut config: AppConfig,
    verbose: bool,
) -> ResultCache {
    config.log.verbose |= verbose;
    ResultCache::from_app_config(store, &config)
}

pub async fn get(
    key: &str,
    store: Option<PathBuf>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let key: CacheKey = key.parse()?;

    let path = store.unwrap_or_else(|| JsonFileKvStore::default_path(CACHE_NAMESPACE));
    let store = JsonFileKvStore::open(path)?;
    let cache = build_cache(Arc::new(store), config, verbose);

    if !cache.is_enabled_for(&key.mode) {
        println!("Caching is disabled for mode '{}'", key.mode);
        return Ok(());
    }

    match cache.lookup(&key).await? {
        Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
        None => println!("No cache entry for {key}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragloom_storage::InMemoryKvStore;
    use ragloom_telemetry::LogVerbosity;

    #[test]
    fn verbosity_follows_config_or_flag() {
        let store: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new());

        let quiet = build_cache(store.clone(), AppConfig::default(), false);
        assert_eq!(quiet.verbosity(), LogVerbosity::Summary);

        let flagged = build_cache(store.clone(), AppConfig::default(), true);
        assert_eq!(flagged.verbosity(), LogVerbosity::Verbose);

        let mut config = AppConfig::default();
        config.log.verbose = true;
        let configured = build_cache(store, config, false);
        assert_eq!(configured.verbosity(), LogVerbosity::Verbose);
    }
}
