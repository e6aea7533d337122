//! `ragloom config`: configuration management commands.

use ragloom_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.cache.enable_llm_cache && !config.cache.enable_llm_cache_for_entity_extract {
                warnings.push("Result caching is disabled for every mode");
            }
            if config.retrieval.enable_rerank && config.retrieval.min_rerank_score > 1.0 {
                warnings.push("min_rerank_score above 1.0 filters out every unscored chunk");
            }
            if config.retrieval.chunk_top_k.is_none() {
                warnings.push("chunk_top_k is 0; only the token budget limits the chunk list");
            }

            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!(
                "   Scheduler: {} workers, queue {}",
                config.scheduler.max_async, config.scheduler.max_queue_size
            );
            println!(
                "   Cache:     extract={} query={}",
                config.cache.enable_llm_cache_for_entity_extract, config.cache.enable_llm_cache
            );
            println!(
                "   Rerank:    {} (min score {})",
                if config.retrieval.enable_rerank { "enabled" } else { "disabled" },
                config.retrieval.min_rerank_score
            );
            println!("   Budget:    {} tokens", config.retrieval.max_total_tokens);
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
