//! # ragloom core
//!
//! Domain types, capability traits and error definitions for the ragloom
//! retrieval core. It performs no I/O of its own; it defines the model that
//! the scheduler, cache and retrieval crates implement against.
//!
//! ## Capabilities
//!
//! Everything expensive or pluggable is a trait here:
//! - [`Operation`]: an asynchronous call (typically an LLM completion)
//! - [`KvStore`]: a string-keyed record store with get-by-id and upsert
//! - [`Reranker`]: reorders and scores candidate chunks for a query
//! - [`Tokenizer`]: encodes text to a count-comparable token sequence

pub mod chunk;
pub mod error;
pub mod ids;
pub mod kv;
pub mod message;
pub mod operation;
pub mod rerank;
pub mod text;
pub mod tokenizer;

// Re-export key types at crate root for ergonomics
pub use chunk::{CandidateChunk, RankedSource, SourceKind};
pub use error::{KeyError, OperationError, RerankError, StoreError};
pub use ids::{compute_args_hash, compute_content_id, generate_track_id};
pub use kv::{KvRecords, KvStore};
pub use message::{Message, Role, conversation_turns};
pub use operation::{Completion, CompletionRequest, Operation};
pub use rerank::Reranker;
pub use text::{clean_text, content_summary};
pub use tokenizer::Tokenizer;
