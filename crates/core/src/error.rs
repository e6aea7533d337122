//! Error types for the ragloom domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each capability has its own error type so callers can match on the
//! failure of the collaborator they actually invoked.

use thiserror::Error;

/// Failure of a wrapped operation (LLM completion, embedding call, ...).
#[derive(Debug, Clone, Error)]
pub enum OperationError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Operation not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Operation failed: {0}")]
    Failed(String),
}

/// Failure of the external key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Record {key} is not valid: {reason}")]
    InvalidRecord { key: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure of the rerank capability.
#[derive(Debug, Clone, Error)]
pub enum RerankError {
    #[error("Rerank request failed: {0}")]
    Request(String),

    #[error("Rerank response malformed: {0}")]
    InvalidResponse(String),
}

/// A flattened cache key that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("Cache key '{0}' must have the form mode:purpose:hash")]
    Malformed(String),

    #[error("Cache key component '{0}' must not be empty")]
    EmptyComponent(&'static str),
}
