//! # rootcause CLI (`rca`)
//!
//! ## Usage
//!
//! ```bash
//! rca --config ./config/rca.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rca init` | Create the pgvector extension, chunk table and indexes |
//! | `rca chunk <file>` | Print the chunks of one file as JSON |
//! | `rca index <repo> <root>` | Chunk a repository and reuse cached embeddings |
//! | `rca embed import <repo> <jsonl>` | Load embeddings from a provider's output |
//! | `rca query <alert>` | Print the similarity search query for an alert |
//! | `rca correlate <alert>` | Rank candidate changes for an alert |
//! | `rca stats <repo>` | Show embedding coverage and cache size |
//! | `rca clear <repo>` | Drop a repository's embeddings and cache entries |
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use rootcause::{config, correlate_cmd, embed_cmd, index_cmd, migrate, stats};

/// rootcause CLI: find the change behind a production alert.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rca.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rca",
    about = "rootcause: correlate production alerts with the code changes that caused them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rca.toml`. `chunk` and `query` fall back to
    /// built-in defaults when the file does not exist.
    #[arg(long, global = true, default_value = "./config/rca.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Enables the `vector` extension and creates the `code_chunks` table
    /// with its indexes. Safe to run repeatedly.
    Init,

    /// Chunk a single file and print the chunks as JSON.
    Chunk {
        /// Source file to chunk.
        file: PathBuf,

        /// Override language detection (e.g. `typescript`, `python`, `go`).
        #[arg(long)]
        language: Option<String>,
    },

    /// Index a repository checkout.
    ///
    /// Crawls `root`, chunks every indexable file in parallel, replaces the
    /// stored chunks of each file, and fills embeddings from the cache.
    Index {
        /// Repository identifier.
        repo_id: String,

        /// Path to the repository checkout.
        root: PathBuf,

        /// Write chunks without a cached embedding to this JSONL file.
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Manage embedding vectors.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Print the search query built from an alert file.
    Query {
        /// Alert JSON file.
        alert: PathBuf,
    },

    /// Rank the alert's candidate changes and print them as JSON.
    Correlate {
        /// Alert JSON file.
        alert: PathBuf,
    },

    /// Show embedding coverage for a repository.
    Stats {
        /// Repository identifier.
        repo_id: String,
    },

    /// Drop a repository's embeddings and invalidate their cache entries.
    Clear {
        /// Repository identifier.
        repo_id: String,
    },
}

#[derive(Subcommand)]
enum EmbedAction {
    /// Import `{"content_hash", "embedding"}` lines into the cache and store.
    Import {
        /// Repository identifier.
        repo_id: String,

        /// JSONL file produced by the embedding provider.
        file: PathBuf,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    // Commands that don't require config
    match &cli.command {
        Commands::Chunk { file, language } => {
            let cfg = config::load_config_or_minimal(&cli.config)?;
            index_cmd::run_chunk(file, language.as_deref(), &cfg.chunking.limits())?;
            return Ok(());
        }
        Commands::Query { alert } => {
            let cfg = config::load_config_or_minimal(&cli.config)?;
            correlate_cmd::run_query(&cfg, alert)?;
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index {
            repo_id,
            root,
            export,
        } => {
            index_cmd::run_index(&cfg, &repo_id, &root, export.as_deref()).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::Import { repo_id, file } => {
                embed_cmd::run_embed_import(&cfg, &repo_id, &file).await?;
            }
        },
        Commands::Correlate { alert } => {
            correlate_cmd::run_correlate(&cfg, &alert).await?;
        }
        Commands::Stats { repo_id } => {
            stats::run_stats(&cfg, &repo_id).await?;
        }
        Commands::Clear { repo_id } => {
            stats::run_clear(&cfg, &repo_id).await?;
        }
        Commands::Chunk { .. } | Commands::Query { .. } => unreachable!(),
    }

    Ok(())
}
