//! CLI commands implementation.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{ScrapeMode, Settings};
use crate::repository::{AsyncSqlitePool, PriceRepository};

#[derive(Parser)]
#[command(name = "pricewatch")]
#[command(about = "Headless-browser commodity price scraper")]
#[command(version)]
pub struct Cli {
    /// Config file path (default: pricewatch.toml in the working directory)
    #[arg(short, long, global = true, env = "PRICEWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scrape and store the result
    Scrape {
        /// Scrape flow to run (defaults to the configured schedule mode)
        #[arg(short, long, value_enum)]
        mode: Option<ScrapeMode>,
    },

    /// Show stored price history
    History {
        /// Number of records to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
        /// Show composite multi-source records
        #[arg(short, long)]
        multi: bool,
    },

    /// Show database status
    Status,

    /// Delete records older than the given number of days
    Prune {
        /// Age threshold in days
        days: i64,
    },

    /// Start the API server with the cron scheduler
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Scrape { mode } => commands::scrape::cmd_scrape(&settings, mode).await,
        Commands::History { limit, multi } => {
            commands::history::cmd_history(&settings, limit, multi).await
        }
        Commands::Status => commands::status::cmd_status(&settings).await,
        Commands::Prune { days } => commands::prune::cmd_prune(&settings, days).await,
        Commands::Serve { host, port } => commands::serve::cmd_serve(&settings, host, port).await,
    }
}

/// Open the database and make sure the schema exists.
pub(crate) async fn open_repository(settings: &Settings) -> anyhow::Result<PriceRepository> {
    let pool = AsyncSqlitePool::new(&settings.database_url());
    let repo = PriceRepository::new(pool);
    repo.ensure_schema()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize database schema: {}", e))?;
    Ok(repo)
}
