//! Deterministic digests and identifiers.

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Hex digest of the concatenation of `parts`.
///
/// Used as the hash component of cache keys, so it must only ever see the
/// logical input of a call (prompt + serialized history), never incidental
/// metadata.
pub fn compute_args_hash<S: AsRef<str>>(parts: &[S]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_ref().as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Content-addressed id: `prefix` followed by the hex digest of `content`.
pub fn compute_content_id(content: &str, prefix: &str) -> String {
    format!("{prefix}{}", compute_args_hash(&[content]))
}

/// A unique tracking id of the form `{prefix}_{YYYYmmdd_HHMMSS}_{8 hex chars}`.
pub fn generate_track_id(prefix: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let unique = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{timestamp}_{}", &unique[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_hash_is_deterministic() {
        assert_eq!(compute_args_hash(&["a", "b"]), compute_args_hash(&["a", "b"]));
        assert_eq!(compute_args_hash(&["ab"]), compute_args_hash(&["a", "b"]));
        assert_ne!(compute_args_hash(&["a"]), compute_args_hash(&["b"]));
        assert_eq!(compute_args_hash(&["x"]).len(), 64);
    }

    #[test]
    fn content_id_carries_prefix() {
        let id = compute_content_id("hello", "chunk-");
        assert!(id.starts_with("chunk-"));
        assert_eq!(id.len(), "chunk-".len() + 64);
        assert_eq!(id, compute_content_id("hello", "chunk-"));
    }

    #[test]
    fn track_id_shape() {
        let id = generate_track_id("upload");
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "upload");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert_eq!(parts[3].len(), 8);
        assert_ne!(id, generate_track_id("upload"));
    }
}
