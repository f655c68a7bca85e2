mod crawl;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "shelfwatch")]
#[command(about = "Multi-storefront product extraction and normalization")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Crawl configured sites and emit normalized products as JSON lines
    Crawl {
        /// Restrict the crawl to these site keys (repeatable; default: all)
        #[arg(long = "site")]
        sites: Vec<String>,
        /// Write products to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List the configured sites
    Sites,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = shelfwatch_core::load_app_config_from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Crawl { sites, output } => crawl::run_crawl(&config, sites, output).await,
        Commands::Sites => crawl::run_sites(&config),
    }
}
