//! Reranker trait: reorders candidate chunks by relevance to a query.

use async_trait::async_trait;

use crate::chunk::CandidateChunk;
use crate::error::RerankError;

/// The rerank capability.
///
/// Implementations return the candidates they consider relevant, most
/// relevant first, with `rerank_score` filled in. They may return fewer
/// than `top_n` documents, but callers must not rely on them returning
/// no more than `top_n`.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// A human-readable name (e.g., "bge-reranker-v2-m3").
    fn name(&self) -> &str;

    async fn rerank(
        &self,
        query: &str,
        documents: Vec<CandidateChunk>,
        top_n: usize,
    ) -> Result<Vec<CandidateChunk>, RerankError>;
}
