//! # Story Corpus CLI (`story`)
//!
//! Builds the story index from an extracted game data directory and answers
//! title, search and body lookups against it.
//!
//! ## Usage
//!
//! ```bash
//! story --config ./config/story.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `story rebuild` | Build a new index generation and persist it |
//! | `story search "<query>"` | Full-text search over story bodies and titles |
//! | `story title <id>` | Display title for a story id or content path |
//! | `story open <id>` | Print a story's body |
//! | `story status` | Lifecycle state and generation counts |
//! | `story sources` | Which metadata tables are present and parsable |
//!
//! Query commands restore the last persisted snapshot. When there is none
//! they build one first.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use story_corpus::config::{self, Config};
use story_corpus::generation::CorpusBuilder;
use story_corpus::lifecycle::{IndexManager, IndexState, RebuildOutcome};
use story_corpus::progress::{ProgressMode, RebuildProgressReporter};
use story_corpus::render::RawText;
use story_corpus::sqlite_store::SqliteSnapshotStore;
use story_corpus::{get, search, sources, status};

/// Story Corpus CLI: resolve titles, reconcile paths and search an
/// extracted story corpus.
#[derive(Parser)]
#[command(
    name = "story",
    about = "Title resolution and full-text search over an extracted game story corpus",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/story.toml`.
    #[arg(long, global = true, default_value = "./config/story.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a new index generation from the tables and corpus.
    ///
    /// The new generation replaces the persisted snapshot. A failed build
    /// leaves the previous snapshot untouched.
    Rebuild {
        /// Progress output on stderr: `off`, `human` or `json`.
        /// Defaults to `human` when stderr is a terminal.
        #[arg(long)]
        progress: Option<ProgressMode>,

        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Search story bodies and titles.
    ///
    /// Every whitespace-separated segment must occur in a story for it to
    /// match.
    Search {
        query: String,

        /// Maximum number of results (defaults to `[search].max_results`).
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Print the display title for a story id, alias or content path.
    Title { id: String },

    /// Print a story's metadata and body.
    Open {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Show the index state and the published generation.
    Status {
        #[arg(long)]
        json: bool,
    },

    /// List the metadata tables and whether each is present and parsable.
    Sources {
        #[arg(long)]
        json: bool,
    },
}

async fn open_manager(cfg: &Config, progress: ProgressMode) -> Result<IndexManager> {
    let builder = CorpusBuilder::new(cfg.corpus.clone(), cfg.tables.clone(), Arc::new(RawText));
    let reporter: Arc<dyn RebuildProgressReporter> = Arc::from(progress.reporter());
    let mut manager =
        IndexManager::new(Arc::new(builder), cfg.search.options()).with_progress(reporter);
    if cfg.index.persist {
        let store = SqliteSnapshotStore::open(&cfg.index.path).await?;
        manager = manager.with_store(Arc::new(store));
    }
    Ok(manager)
}

/// Restore the snapshot, or build a generation when there is none.
async fn ready_manager(cfg: &Config) -> Result<IndexManager> {
    let manager = open_manager(cfg, ProgressMode::default_for_tty()).await?;
    manager.restore().await?;
    if manager.state() == IndexState::Empty {
        info!("no usable snapshot; building the index");
        if let RebuildOutcome::Failed { reason, .. } = manager.rebuild_index().await {
            bail!("index build failed: {}", reason);
        }
    }
    Ok(manager)
}

fn print_outcome(outcome: &RebuildOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }
    match outcome {
        RebuildOutcome::Rebuilt {
            summary, persisted, ..
        } => {
            println!("Rebuilt generation {}", summary.generation_id);
            println!("  units:       {}", summary.unit_count);
            println!("  indexed:     {}", summary.indexed_count);
            println!("  unresolved:  {}", summary.unresolved_count);
            println!("  warnings:    {}", summary.warning_count);
            println!("  persisted:   {}", persisted);
        }
        RebuildOutcome::Failed { reason, .. } => {
            eprintln!("Rebuild failed: {}", reason);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Rebuild { progress, json } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            let manager = open_manager(&cfg, mode).await?;
            let outcome = manager.rebuild_index().await;
            print_outcome(&outcome, json)?;
            if !outcome.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Search { query, limit, json } => {
            let manager = ready_manager(&cfg).await?;
            search::run_search(&manager, &query, limit, json)?;
        }
        Commands::Title { id } => {
            let manager = ready_manager(&cfg).await?;
            get::run_title(&manager, &id)?;
        }
        Commands::Open { id, json } => {
            let manager = ready_manager(&cfg).await?;
            get::run_open(&manager, &id, json)?;
        }
        Commands::Status { json } => {
            let manager = open_manager(&cfg, ProgressMode::Off).await?;
            manager.restore().await?;
            status::run_status(&cfg, &manager.status(), json)?;
        }
        Commands::Sources { json } => {
            sources::list_sources(&cfg, json)?;
        }
    }

    Ok(())
}
