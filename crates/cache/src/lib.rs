//! Result cache for expensive operations.
//!
//! Results are stored in an external [`KvStore`](ragloom_core::KvStore)
//! under flattened `mode:purpose:hash` keys, where the hash covers only the
//! logical input of the call. [`CachedInvoker`] puts the cache in front of
//! an LLM completion operation.

pub mod invoker;
pub mod key;
pub mod links;
pub mod result_cache;

pub use invoker::{CachedInvoker, InvokeOutcome, InvokeRequest, strip_think_tags};
pub use key::{CacheKey, DEFAULT_MODE, logical_input};
pub use links::link_cache_keys;
pub use result_cache::{CacheEntry, CacheWrite, ResultCache, SkipReason, StoreOutcome};

use ragloom_core::{KeyError, StoreError};

/// Failure of a cached invocation.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError<E> {
    /// The wrapped operation failed; its error is passed through unchanged.
    #[error(transparent)]
    Operation(E),

    /// The cache store could not be read or written.
    #[error("Cache store failed: {0}")]
    Store(#[from] StoreError),

    /// The request's mode or purpose cannot form a cache key.
    #[error("Invalid cache key: {0}")]
    InvalidKey(#[from] KeyError),
}
