//! Chunk assembly pipeline.
//!
//! `assemble` runs the stages in a fixed order:
//!
//! 1. **Dedupe** by storage id, first occurrence wins.
//! 2. **Rerank** with the configured [`Reranker`], if enabled and the query is
//!    non-empty. A missing, failing, or empty-handed reranker leaves the
//!    candidates as they were.
//! 3. **Score filter**: with reranking enabled and a positive minimum, drop
//!    chunks scoring below it. Unscored chunks count as 1.0.
//! 4. **Top-K cap**.
//! 5. **Token truncation** to the request budget, or the assembler default.
//!
//! No stage is fatal; the worst case is a pass-through.

use ragloom_config::RetrievalConfig;
use ragloom_core::{CandidateChunk, Reranker, Tokenizer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::truncate::truncate_by_token_budget;

/// Token budget used when neither the request nor the assembler sets one.
pub const DEFAULT_TOKEN_BUDGET: usize = 30_000;

/// Per-request assembly settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembleOptions {
    pub enable_rerank: bool,

    /// Keep at most this many chunks (`None` or 0 keeps all)
    #[serde(default)]
    pub chunk_top_k: Option<usize>,

    /// Minimum rerank score, applied only when reranking is enabled (0 disables)
    pub min_rerank_score: f32,

    /// Token budget for the final list (`None` uses the assembler default)
    #[serde(default)]
    pub token_budget: Option<usize>,
}

impl AssembleOptions {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            enable_rerank: config.enable_rerank,
            chunk_top_k: config.chunk_top_k,
            min_rerank_score: config.min_rerank_score,
            token_budget: Some(config.max_total_tokens),
        }
    }

    fn top_k(&self) -> Option<usize> {
        self.chunk_top_k.filter(|k| *k > 0)
    }
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            token_budget: None,
            ..Self::from_config(&RetrievalConfig::default())
        }
    }
}

/// Keep the first occurrence of each chunk id, preserving order.
pub fn dedupe_candidates(candidates: Vec<CandidateChunk>) -> Vec<CandidateChunk> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|chunk| seen.insert(chunk.id.clone()))
        .collect()
}

/// Reranks, filters, caps and truncates candidate chunks.
#[derive(Clone)]
pub struct ChunkAssembler {
    reranker: Option<Arc<dyn Reranker>>,
    tokenizer: Arc<dyn Tokenizer>,
    default_token_budget: usize,
}

impl ChunkAssembler {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            reranker: None,
            tokenizer,
            default_token_budget: DEFAULT_TOKEN_BUDGET,
        }
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_default_token_budget(mut self, budget: usize) -> Self {
        self.default_token_budget = budget;
        self
    }

    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    /// Rerank `chunks` for `query`, falling back to the input order on any
    /// failure.
    ///
    /// Results longer than `top_n` are cut to `top_n`.
    pub async fn rerank(
        &self,
        query: &str,
        chunks: Vec<CandidateChunk>,
        top_n: usize,
    ) -> Vec<CandidateChunk> {
        if chunks.is_empty() {
            return chunks;
        }
        let Some(reranker) = &self.reranker else {
            warn!("Rerank is enabled but no rerank model is configured");
            return chunks;
        };

        let before = chunks.len();
        match reranker.rerank(query, chunks.clone(), top_n).await {
            Ok(ranked) if ranked.is_empty() => {
                warn!(reranker = reranker.name(), "Rerank returned no documents, keeping original order");
                chunks
            }
            Ok(mut ranked) => {
                ranked.truncate(top_n);
                debug!(
                    reranker = reranker.name(),
                    before,
                    after = ranked.len(),
                    "Reranked chunks"
                );
                ranked
            }
            Err(e) => {
                error!(reranker = reranker.name(), error = %e, "Rerank failed, keeping original order");
                chunks
            }
        }
    }

    /// Produce the final chunk list for `query`.
    pub async fn assemble(
        &self,
        query: &str,
        candidates: Vec<CandidateChunk>,
        options: &AssembleOptions,
    ) -> Vec<CandidateChunk> {
        let received = candidates.len();
        let mut chunks = dedupe_candidates(candidates);
        if chunks.is_empty() {
            return chunks;
        }

        if options.enable_rerank && !query.is_empty() {
            let top_n = options.top_k().unwrap_or(chunks.len());
            chunks = self.rerank(query, chunks, top_n).await;
        }

        if options.enable_rerank && options.min_rerank_score > 0.0 {
            let before = chunks.len();
            chunks.retain(|chunk| chunk.effective_score() >= options.min_rerank_score);
            if chunks.len() < before {
                info!(
                    dropped = before - chunks.len(),
                    min_score = options.min_rerank_score,
                    "Filtered low-scoring chunks"
                );
            }
            if chunks.is_empty() {
                return chunks;
            }
        }

        if let Some(k) = options.top_k() {
            chunks.truncate(k);
        }

        let budget = options.token_budget.unwrap_or(self.default_token_budget);
        let chunks = truncate_by_token_budget(
            chunks,
            |chunk| chunk.content.as_str(),
            budget,
            self.tokenizer.as_ref(),
        );

        info!(received, kept = chunks.len(), budget, "Assembled chunks");
        chunks
    }
}
