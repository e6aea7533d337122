//! ragloom CLI, the main entry point.
//!
//! Commands:
//! - `config`    Show, locate or validate the configuration
//! - `allocate`  Spread a chunk budget over ranked entities/relations
//! - `assemble`  Filter, cap and token-truncate candidate chunks
//! - `cache`     Inspect entries of a JSON-file result cache

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "ragloom",
    about = "ragloom: scheduling, result caching and context assembly for retrieval",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging with full cache payloads (same as `RAGLOOM_VERBOSE`)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Select chunk ids for ranked entities/relations
    Allocate {
        /// JSON file holding an array of {"id", "sorted_chunks"} objects, most important first
        #[arg(short, long)]
        input: PathBuf,

        /// Chunks for the most important source (defaults to retrieval.related_chunk_max)
        #[arg(long)]
        max: Option<usize>,

        /// Chunks for the least important source (defaults to retrieval.related_chunk_min)
        #[arg(long)]
        min: Option<usize>,
    },

    /// Assemble the final chunk list for a query
    Assemble {
        /// JSON file holding an array of candidate chunks, most relevant first
        #[arg(short, long)]
        input: PathBuf,

        /// The user query
        #[arg(short, long, default_value = "")]
        query: String,

        /// Keep at most this many chunks
        #[arg(long)]
        top_k: Option<usize>,

        /// Token budget for the final list
        #[arg(long)]
        budget: Option<usize>,

        /// Skip reranking and score filtering
        #[arg(long)]
        no_rerank: bool,
    },

    /// Result cache inspection
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
    /// Check the configuration for errors
    Validate,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Look up a `mode:purpose:hash` key
    Get {
        key: String,

        /// Cache file (defaults to ~/.ragloom/kv_store_llm_response_cache.json)
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
        Commands::Allocate { input, max, min } => commands::allocate::run(&input, max, min).await?,
        Commands::Assemble {
            input,
            query,
            top_k,
            budget,
            no_rerank,
        } => {
            let overrides = commands::assemble::Overrides {
                top_k,
                budget,
                no_rerank,
            };
            commands::assemble::run(&input, &query, overrides).await?
        }
        Commands::Cache { action } => match action {
            CacheAction::Get { key, store } => {
                commands::cache::get(&key, store, cli.verbose).await?
            }
        },
    }

    Ok(())
}
