//! Back-links from source chunks to the cache entries computed for them.

use ragloom_core::{KvRecords, KvStore};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::key::CacheKey;

/// Field of a chunk record that lists cache keys derived from the chunk.
pub const CACHE_LIST_FIELD: &str = "llm_cache_list";

/// Append `keys` not already present to the chunk record's cache list.
///
/// Returns how many keys were added. A missing chunk, a malformed record and
/// store failures are logged and reported as zero; they never fail the caller.
pub async fn link_cache_keys(chunks: &dyn KvStore, chunk_id: &str, keys: &[CacheKey]) -> usize {
    if keys.is_empty() {
        return 0;
    }

    let record = match chunks.get_by_id(chunk_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            debug!(chunk_id, "Chunk not found, cache keys not linked");
            return 0;
        }
        Err(e) => {
            warn!(chunk_id, error = %e, "Failed to read chunk for cache linking");
            return 0;
        }
    };

    let Value::Object(mut fields) = record else {
        warn!(chunk_id, "Chunk record is not an object, cache keys not linked");
        return 0;
    };

    let list = fields
        .entry(CACHE_LIST_FIELD)
        .or_insert_with(|| Value::Array(Vec::new()));
    let Value::Array(list) = list else {
        warn!(chunk_id, "Chunk cache list is not an array, cache keys not linked");
        return 0;
    };

    let mut known: HashSet<String> = list
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    let mut added = 0;
    for key in keys {
        let flat = key.to_string();
        if known.insert(flat.clone()) {
            list.push(Value::String(flat));
            added += 1;
        }
    }

    if added == 0 {
        return 0;
    }

    let records = KvRecords::from([(chunk_id.to_string(), Value::Object(fields))]);
    match chunks.upsert(records).await {
        Ok(()) => {
            debug!(chunk_id, added, "Linked cache keys to chunk");
            added
        }
        Err(e) => {
            warn!(chunk_id, error = %e, "Failed to link cache keys to chunk");
            0
        }
    }
}
