//! # ragloom retrieval
//!
//! Turns ranked retrieval candidates into the context handed to answer
//! generation:
//!
//! - [`allocate_gradient`] spreads a chunk budget over entities/relations
//!   sorted by importance, more for the top, less for the bottom.
//! - [`ChunkAssembler`] reranks, filters, caps and token-truncates a
//!   candidate list.
//! - [`truncate_by_token_budget`] keeps the longest prefix that fits a
//!   token budget.
//!
//! Tokenizers live in [`tokenizer`]; the HuggingFace-backed one needs the
//! `hf` feature.

pub mod allocate;
pub mod pipeline;
pub mod tokenizer;
pub mod truncate;

pub use allocate::{allocate_gradient, gradient_targets};
pub use pipeline::{AssembleOptions, ChunkAssembler, dedupe_candidates};
pub use tokenizer::HeuristicTokenizer;
#[cfg(feature = "hf")]
pub use tokenizer::{HfTokenizer, TokenizerLoadError};
pub use truncate::truncate_by_token_budget;
