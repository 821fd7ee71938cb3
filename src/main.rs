use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use chunkvault::{config, db, ingest, migrate, query};

#[derive(Parser)]
#[command(
    name = "ckv",
    version,
    about = "Content-addressed document chunking, embedding, and retrieval"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "ckv.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and schema
    Init,
    /// Scan the docs root and ingest documents
    Ingest {
        /// Count documents and chunks without embedding or storing
        #[arg(long)]
        dry_run: bool,
    },
    /// Search stored chunks by semantic similarity
    Query {
        /// Query text
        text: String,
        /// Maximum number of results (overrides the configured default)
        #[arg(long)]
        top_k: Option<usize>,
        /// Emit results as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&config.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Initialized database at {}", config.db.path.display());
            Ok(())
        }
        Commands::Ingest { dry_run } => ingest::run_ingest(&config, dry_run).await,
        Commands::Query { text, top_k, json } => {
            query::run_query(&config, &text, top_k, json).await
        }
    }
}
