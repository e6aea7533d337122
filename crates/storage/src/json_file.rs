//! File-based store: one JSON object holding every record.
//!
//! Records are loaded into memory on creation and the whole map is written
//! back on every `upsert`. Reads never touch the disk.
//!
//! Default location: `~/.ragloom/kv_store_llm_response_cache.json`

use async_trait::async_trait;
use ragloom_config::AppConfig;
use ragloom_core::error::StoreError;
use ragloom_core::kv::{KvRecords, KvStore};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A file-backed store for cache entries and chunk records.
pub struct JsonFileKvStore {
    path: PathBuf,
    records: Arc<RwLock<HashMap<String, Value>>>,
}

impl JsonFileKvStore {
    /// Open the store at `path`.
    ///
    /// A missing file starts empty and is created on first write. A file that
    /// exists but is not a JSON object is an error.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let records = Self::load_from_disk(&path)?;
        debug!(path = %path.display(), count = records.len(), "JSON file store loaded");
        Ok(Self {
            path,
            records: Arc::new(RwLock::new(records)),
        })
    }

    /// Default path for the named namespace: `~/.ragloom/kv_store_{namespace}.json`
    pub fn default_path(namespace: &str) -> PathBuf {
        AppConfig::config_dir().join(format!("kv_store_{namespace}.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Result<HashMap<String, Value>, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(StoreError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        if content.trim().is_empty() {
            warn!(path = %path.display(), "Store file is empty, starting fresh");
            return Ok(HashMap::new());
        }

        Ok(serde_json::from_str(&content)?)
    }

    /// Write every record to disk.
    async fn flush(&self) -> Result<(), StoreError> {
        let records = self.records.read().await;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Storage(format!("Failed to create store directory: {e}"))
            })?;
        }

        let content = serde_json::to_string_pretty(&*records)?;
        std::fs::write(&self.path, content)
            .map_err(|e| StoreError::Storage(format!("Failed to write store file: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl KvStore for JsonFileKvStore {
    fn name(&self) -> &str {
        "json_file"
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn upsert(&self, records: KvRecords) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        self.records.write().await.extend(records);
        self.flush().await
    }
}
