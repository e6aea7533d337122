//! `ragloom assemble`: run candidate chunks through the assembly pipeline.
//!
//! Uses the heuristic tokenizer. No rerank model is wired into the CLI, so
//! with reranking enabled the pipeline logs a warning and only applies the
//! score filter to chunks that already carry a score.

use ragloom_config::AppConfig;
use ragloom_core::CandidateChunk;
use ragloom_retrieval::{AssembleOptions, ChunkAssembler, HeuristicTokenizer};
use std::path::Path;
use std::sync::Arc;

use super::read_json;

/// Command-line adjustments on top of the configured options.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub top_k: Option<usize>,
    pub budget: Option<usize>,
    pub no_rerank: bool,
}

impl Overrides {
    pub fn apply(self, mut options: AssembleOptions) -> AssembleOptions {
        if self.top_k.is_some() {
            options.chunk_top_k = self.top_k;
        }
        if self.budget.is_some() {
            options.token_budget = self.budget;
        }
        if self.no_rerank {
            options.enable_rerank = false;
        }
        options
    }
}

pub async fn run(
    input: &Path,
    query: &str,
    overrides: Overrides,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let candidates: Vec<CandidateChunk> = read_json(input)?;

    let options = overrides.apply(AssembleOptions::from_config(&config.retrieval));
    let assembler = ChunkAssembler::new(Arc::new(HeuristicTokenizer::new()))
        .with_default_token_budget(config.retrieval.max_total_tokens);

    let chunks = assembler.assemble(query, candidates, &options).await;
    println!("{}", serde_json::to_string_pretty(&chunks)?);
    Ok(())
}
