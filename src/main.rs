//! # Thematic CLI
//!
//! The `thematic` binary drives the feed-clustering service: database
//! initialization, feed ingestion, theme inspection, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! thematic --config ./config/thematic.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `thematic init` | Create the SQLite database and run schema migrations |
//! | `thematic warmup` | Download and cache the embedding model |
//! | `thematic ingest <feed_url>` | Fetch a feed and cluster its entries |
//! | `thematic themes` | List all themes with document counts |
//! | `thematic timeline <theme_id>` | Show a theme's documents chronologically |
//! | `thematic serve` | Start the JSON HTTP API |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use thematic::{config, db, embedding, ingest, migrate, server, store};

/// Thematic — RSS/Atom thesis extraction and incremental theme clustering.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/thematic.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "thematic",
    about = "Thematic — RSS/Atom thesis extraction and incremental theme clustering",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/thematic.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents/themes tables.
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Download and cache the embedding model.
    ///
    /// Optional: `ingest` and `serve` load the model on their own, but a
    /// warmup ahead of time keeps first-request latency flat.
    Warmup,

    /// Fetch one feed and cluster its entries into themes.
    ///
    /// New entries are assigned to the most similar existing theme or
    /// found a new one; entries seen before are updated in place when
    /// their content changed, otherwise skipped.
    Ingest {
        /// The RSS or Atom feed URL.
        feed_url: String,
    },

    /// List all themes with their document counts.
    Themes,

    /// Show one theme's documents in chronological order.
    Timeline {
        /// Theme id as shown by `thematic themes`.
        theme_id: i64,
    },

    /// Start the JSON HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("thematic=info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Warmup => {
            let embedder = embedding::create_embedder(&cfg.embedding)?;
            embedder.preload().await?;
            println!("Embedding model '{}' ready.", embedder.model_name());
        }
        Commands::Ingest { feed_url } => {
            ingest::run(&cfg, &feed_url).await?;
        }
        Commands::Themes => {
            run_themes(&cfg).await?;
        }
        Commands::Timeline { theme_id } => {
            run_timeline(&cfg, theme_id).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

async fn run_themes(cfg: &config::Config) -> anyhow::Result<()> {
    let pool = db::connect(cfg).await?;
    let themes = store::list_themes(&pool).await?;

    if themes.is_empty() {
        println!("No themes.");
    }
    for theme in &themes {
        println!(
            "{}. [{} documents] {}",
            theme.id, theme.document_count, theme.thesis
        );
        println!("    created: {}", theme.created_at);
    }

    pool.close().await;
    Ok(())
}

async fn run_timeline(cfg: &config::Config, theme_id: i64) -> anyhow::Result<()> {
    let pool = db::connect(cfg).await?;
    let timeline = match store::theme_timeline(&pool, theme_id).await? {
        Some(timeline) => timeline,
        None => {
            eprintln!("Error: theme not found: {}", theme_id);
            std::process::exit(1);
        }
    };

    println!("--- Theme {} ---", timeline.theme_id);
    println!("thesis: {}", timeline.thesis);
    println!();
    for doc in &timeline.documents {
        println!("{}  {}", doc.published_at, doc.title);
        println!("    url: {}", doc.url);
        println!("    ingested: {}", doc.ingested_at);
    }

    pool.close().await;
    Ok(())
}
