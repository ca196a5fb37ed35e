//! # Quarry CLI (`qry`)
//!
//! The `qry` binary is the interface to Quarry. It provides commands for
//! database initialization, incremental indexing, semantic search, document
//! inspection, and corpus statistics.
//!
//! ## Usage
//!
//! ```bash
//! qry --config ./config/quarry.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `qry init` | Create the SQLite database and run schema migrations |
//! | `qry sync` | Incrementally index the configured source folder |
//! | `qry search "<query>"` | Rank stored fragments by semantic similarity |
//! | `qry get <id>` | Print a stored document by id |
//! | `qry stats` | Show corpus and manifest statistics |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use quarry::{config, db, get, migrate, search, stats, sync};

/// Quarry — offline semantic search over a personal document collection.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/quarry.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "qry",
    about = "Quarry — offline semantic search over a personal document collection",
    version,
    long_about = "Quarry indexes a folder of documents into fixed-dimension vectors with a \
    deterministic model-free embedder and answers natural-language queries with exact cosine \
    k-NN. Everything runs locally; no network, no external model."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/quarry.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents table. Idempotent —
    /// running it multiple times is safe.
    Init,

    /// Incrementally index the source folder.
    ///
    /// Scans the configured filesystem source, re-processes files whose
    /// content hash changed, removes records for deleted files, and updates
    /// the fingerprint manifest.
    Sync {
        /// Source root override (defaults to `[sources.filesystem].root`).
        #[arg(long)]
        root: Option<PathBuf>,

        /// Discard the manifest and re-index everything from scratch.
        #[arg(long)]
        full: bool,
    },

    /// Search indexed documents by semantic similarity.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,

        /// Minimum cosine similarity for a result to be shown.
        #[arg(long)]
        min_score: Option<f32>,
    },

    /// Print a stored document by id.
    Get {
        /// Record id.
        id: i64,
    },

    /// Show corpus and manifest statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Sync { root, full } => {
            sync::run_sync(&cfg, root, full).await?;
        }
        Commands::Search {
            query,
            limit,
            min_score,
        } => {
            search::run_search(&cfg, &query, limit, min_score).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, id).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
