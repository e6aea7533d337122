//! KvStore trait: the external key-value storage capability.
//!
//! The retrieval core never owns storage. It needs exactly two things from
//! a store: fetch one record by its string key, and upsert a batch of
//! records. Records are opaque JSON objects; their shape is decided by the
//! caller (the result cache, the chunk store, ...).
//!
//! Implementations are assumed safe for concurrent get/upsert.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::StoreError;

/// A batch of records to upsert, keyed by id.
pub type KvRecords = HashMap<String, Value>;

/// The core KvStore trait.
///
/// Implementations: in-memory, JSON file, no-op (see `ragloom-storage`).
#[async_trait]
pub trait KvStore: Send + Sync {
    /// The store name (e.g., "in_memory", "json_file", "none").
    fn name(&self) -> &str;

    /// Fetch a record by id.
    async fn get_by_id(&self, id: &str) -> Result<Option<Value>, StoreError>;

    /// Insert or replace every record in the batch.
    async fn upsert(&self, records: KvRecords) -> Result<(), StoreError>;
}
