//! `migrate`, `seed`, and `sources` command handlers.

use boothdb_core::{AppConfig, SourceRepository};
use boothdb_db::PgStore;

use crate::stores::connect;

pub(crate) async fn run_migrate(config: &AppConfig) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let applied = boothdb_db::run_migrations(&pool).await?;
    println!("applied {applied} migration(s)");
    Ok(())
}

pub(crate) async fn run_seed(config: &AppConfig) -> anyhow::Result<()> {
    let registry = boothdb_core::load_sources(&config.sources_path)?;
    let pool = connect(config).await?;
    let count = boothdb_db::seed_sources(&pool, &registry.sources).await?;
    tracing::info!(count, path = %config.sources_path.display(), "sources seeded");
    println!("seeded {count} source(s)");
    Ok(())
}

pub(crate) async fn run_sources(config: &AppConfig) -> anyhow::Result<()> {
    let store = PgStore::new(connect(config).await?);
    let sources = store.list_sources().await?;
    if sources.is_empty() {
        println!("no sources registered; run `boothdb-cli seed`");
        return Ok(());
    }

    for source in &sources {
        let learned = source
            .pattern_learned_at
            .map_or_else(|| "-".to_string(), |at| at.format("%Y-%m-%d").to_string());
        println!(
            "{:<28} {:<18} {:<7} {:<12} {:<10} {}",
            source.slug,
            source.source_type,
            source.extraction_mode,
            source.pattern_learning_status,
            learned,
            if source.enabled { "enabled" } else { "disabled" },
        );
    }
    Ok(())
}
