//! `ragloom allocate`: gradient chunk selection over ranked sources.

use ragloom_config::AppConfig;
use ragloom_core::RankedSource;
use ragloom_retrieval::allocate_gradient;
use std::path::Path;
use tracing::info;

use super::read_json;

pub async fn run(
    input: &Path,
    max: Option<usize>,
    min: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let sources: Vec<RankedSource> = read_json(input)?;

    let max = max.unwrap_or(config.retrieval.related_chunk_max);
    let min = min.unwrap_or(config.retrieval.related_chunk_min);
    if min > max {
        return Err(format!("--min ({min}) must not exceed --max ({max})").into());
    }

    let ids = allocate_gradient(&sources, max, min);
    info!(sources = sources.len(), selected = ids.len(), "Allocated chunks");
    println!("{}", serde_json::to_string_pretty(&ids)?);
    Ok(())
}
