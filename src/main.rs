//! Axon CLI entry point

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "axon")]
#[command(about = "Graph-powered code intelligence engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a repository into a knowledge graph
    Analyze {
        /// Path to the repository to index
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Perform a full re-index
        #[arg(long)]
        full: bool,
    },
    /// Show index status for the current repository
    Status,
    /// Hybrid search over the current repository's index
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Compare two branches structurally (base..current)
    Diff {
        /// Branch range, e.g. main..feature
        range: String,

        /// Repository path
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Watch a repository and re-index on changes
    Watch {
        /// Repository path
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("axon={log_level}")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Analyze { path, full } => commands::analyze(path, full),
        Commands::Status => commands::status(),
        Commands::Search { query, limit } => commands::search(query, limit),
        Commands::Diff { range, path } => commands::diff(path, range),
        Commands::Watch { path } => commands::watch(path).await,
        Commands::Version => {
            println!("Axon v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
