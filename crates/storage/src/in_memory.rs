//! In-memory store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use ragloom_core::error::StoreError;
use ragloom_core::kv::{KvRecords, KvStore};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// A store that keeps records in a map.
///
/// Counts every `upsert` call so callers can assert whether a write happened.
pub struct InMemoryKvStore {
    records: Arc<RwLock<HashMap<String, Value>>>,
    upserts: AtomicUsize,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            upserts: AtomicUsize::new(0),
        }
    }

    /// Number of `upsert` calls made so far.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn upsert(&self, records: KvRecords) -> Result<(), StoreError> {
        self.upserts.fetch_add(1, Ordering::Relaxed);
        self.records.write().await.extend(records);
        Ok(())
    }
}
