//! Process-wide call counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for expensive calls and cache hits.
///
/// Shared via `Arc` between every cached invoker of a pipeline.
#[derive(Debug, Default)]
pub struct CallStatistics {
    operation_calls: AtomicU64,
    cache_hits: AtomicU64,
    embed_calls: AtomicU64,
}

/// A point-in-time copy of [`CallStatistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub operation_calls: u64,
    pub cache_hits: u64,
    pub embed_calls: u64,
}

impl CallStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_operation_call(&self) {
        self.operation_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_embed_call(&self) {
        self.embed_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            operation_calls: self.operation_calls.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            embed_calls: self.embed_calls.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.operation_calls.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.embed_calls.store(0, Ordering::Relaxed);
    }
}

impl StatisticsSnapshot {
    /// Fraction of lookups answered from cache, 0.0 when nothing ran yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.operation_calls + self.cache_hits;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}
