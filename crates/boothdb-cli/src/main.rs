mod adapters;
mod crawl;
mod db;
mod dedup;
mod geocode;
mod stores;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "boothdb-cli")]
#[command(about = "Photo booth catalog crawler and entity resolver")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Upsert the source registry into the database
    Seed,
    /// List registered sources and their pattern-learning state
    Sources,
    /// Extract, geocode, deduplicate, and store booths from registered sources
    Crawl {
        /// Restrict the crawl to one source (by slug)
        #[arg(long)]
        source: Option<String>,

        /// Use this HTML file instead of fetching the page (requires --source)
        #[arg(long, requires = "source")]
        content: Option<PathBuf>,

        /// Run against an in-memory store seeded from the registry file
        #[arg(long)]
        offline: bool,

        /// Extract and deduplicate without writing to the catalog
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of sources crawled at once
        #[arg(long, default_value_t = 2)]
        concurrency: usize,
    },
    /// Deduplicate a JSON array of candidate records
    Dedup {
        #[arg(long)]
        input: PathBuf,

        /// Write the surviving records here as JSON
        #[arg(long)]
        output: Option<PathBuf>,

        /// Never geocode records that lack coordinates
        #[arg(long)]
        no_geocode: bool,
    },
    /// Resolve one address through the geocoding cascade
    Geocode {
        address: String,

        /// Venue name, used to reject addresses that are only a name
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        country: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("boothdb-cli ready; run with --help for commands");
        return Ok(());
    };

    let config = boothdb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match command {
        Commands::Migrate => db::run_migrate(&config).await,
        Commands::Seed => db::run_seed(&config).await,
        Commands::Sources => db::run_sources(&config).await,
        Commands::Crawl {
            source,
            content,
            offline,
            dry_run,
            concurrency,
        } => {
            crawl::run_crawl(
                &config,
                source.as_deref(),
                content.as_deref(),
                offline,
                dry_run,
                concurrency,
            )
            .await
        }
        Commands::Dedup {
            input,
            output,
            no_geocode,
        } => dedup::run_dedup(&config, &input, output.as_deref(), no_geocode).await,
        Commands::Geocode {
            address,
            name,
            city,
            country,
        } => {
            let query = boothdb_core::GeocodeQuery {
                address,
                name,
                city,
                state: None,
                country,
                prior: None,
            };
            geocode::run_geocode(&config, &query).await
        }
    }
}

#[cfg(test)]
mod tests;
