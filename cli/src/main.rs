mod commands;
mod config;
mod server;

use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;

use crate::commands::{cmd_ask, cmd_history};
use crate::config::Config;
use nosh_core::dataset;
use nosh_core::db::{Database, Store};
use nosh_core::service::NoshService;

#[derive(Parser)]
#[command(
    name = "nosh",
    version,
    about = "A conversational nutrition lookup CLI",
    long_about = "nosh — ask about a food in plain words (\"grilled chicken 250g\") and get\nits calories and macros, scaled to your serving. Every question and answer\nis kept as a local conversation history."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask about a food (e.g. "grilled chicken 250g")
    Ask {
        /// Free-text food query, optionally with a weight
        query: String,
        /// Serving weight in grams (overrides any weight in the query)
        #[arg(short, long)]
        grams: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show recent conversation history
    History {
        /// Maximum number of turns to show
        #[arg(short, long, default_value = "30")]
        limit: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let store: Arc<dyn Store> = Arc::new(Mutex::new(Database::open(&config.db_path)?));

    if let Some(summary) = dataset::ensure_reference_data(store.as_ref(), &config.dataset_path)? {
        eprintln!(
            "Loaded {} foods from {} ({} duplicates, {} unparseable rows skipped)",
            summary.foods_loaded,
            config.dataset_path.display(),
            summary.duplicates_skipped,
            summary.rows_skipped,
        );
    }

    let service = Arc::new(NoshService::new(store)?);

    match cli.command {
        Commands::Ask { query, grams, json } => cmd_ask(&service, &query, grams, json),
        Commands::History { limit, json } => cmd_history(&service, limit, json),
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                let (key, _new) = config.load_or_create_api_key()?;
                Some(key)
            };
            server::start_server(service, port, &bind, api_key).await
        }
    }
}
