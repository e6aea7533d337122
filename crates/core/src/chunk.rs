//! Retrieval-side value objects: candidate chunks and ranked sources.

use serde::{Deserialize, Serialize};

/// Where a candidate chunk was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Direct vector similarity search over chunks
    Vector,
    /// Chunks attached to a matched entity
    Entity,
    /// Chunks attached to a matched relationship
    Relationship,
    /// Several of the above, merged
    #[default]
    Mixed,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Vector => "vector",
            Self::Entity => "entity",
            Self::Relationship => "relationship",
            Self::Mixed => "mixed",
        };
        f.write_str(name)
    }
}

/// A chunk under consideration for an answer-generation context.
///
/// Identity is the storage `id`; two candidates with the same id are the
/// same chunk regardless of their content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateChunk {
    /// Storage id of the chunk
    pub id: String,

    /// The chunk text
    pub content: String,

    /// Score assigned by a reranker, if one ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,

    /// Which retrieval path produced this candidate
    #[serde(default)]
    pub source_kind: SourceKind,

    /// Entity whose chunk list this candidate came from (grouping only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_entity_id: Option<String>,
}

impl CandidateChunk {
    /// Score used by the rerank filter. Unscored chunks count as 1.0.
    pub const DEFAULT_RERANK_SCORE: f32 = 1.0;

    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            rerank_score: None,
            source_kind: SourceKind::default(),
            origin_entity_id: None,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.rerank_score = Some(score);
        self
    }

    pub fn with_source(mut self, kind: SourceKind) -> Self {
        self.source_kind = kind;
        self
    }

    pub fn with_origin(mut self, entity_id: impl Into<String>) -> Self {
        self.origin_entity_id = Some(entity_id.into());
        self
    }

    /// The rerank score, or [`Self::DEFAULT_RERANK_SCORE`] when absent.
    pub fn effective_score(&self) -> f32 {
        self.rerank_score.unwrap_or(Self::DEFAULT_RERANK_SCORE)
    }
}

/// An entity or relation, already ranked by importance, with its chunk ids
/// ordered most relevant first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedSource {
    /// Entity or relation id
    pub id: String,

    /// Associated chunk ids, most relevant first
    #[serde(default)]
    pub sorted_chunks: Vec<String>,
}

impl RankedSource {
    pub fn new<I, S>(id: impl Into<String>, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            sorted_chunks: chunks.into_iter().map(Into::into).collect(),
        }
    }
}
