//! No-op store: disables persistence entirely.

use async_trait::async_trait;
use ragloom_core::error::StoreError;
use ragloom_core::kv::{KvRecords, KvStore};
use serde_json::Value;

/// A store that forgets everything it is given.
pub struct NoopKvStore;

#[async_trait]
impl KvStore for NoopKvStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn get_by_id(&self, _id: &str) -> Result<Option<Value>, StoreError> {
        Ok(None)
    }

    async fn upsert(&self, _records: KvRecords) -> Result<(), StoreError> {
        Ok(())
    }
}
