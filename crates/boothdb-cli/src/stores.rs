//! Repository wiring: Postgres for normal runs, memory for `--offline`.

use std::sync::Arc;

use boothdb_core::{
    AppConfig, CatalogRepository, MatchRepository, PatternRepository, SourceRepository,
};
use boothdb_db::{MemoryStore, PgStore, PoolConfig};

pub(crate) async fn connect(config: &AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = PoolConfig::from_app_config(config);
    let pool = boothdb_db::connect_pool(&config.database_url, pool_config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to connect to database: {e}"))?;
    boothdb_db::ping(&pool).await?;
    Ok(pool)
}

/// Every repository port, backed by one store.
pub(crate) struct Stores {
    pub sources: Arc<dyn SourceRepository>,
    pub patterns: Arc<dyn PatternRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub matches: Arc<dyn MatchRepository>,
}

impl Stores {
    pub(crate) fn from_store<S>(store: &Arc<S>) -> Self
    where
        S: SourceRepository + PatternRepository + CatalogRepository + MatchRepository + 'static,
    {
        Self {
            sources: store.clone(),
            patterns: store.clone(),
            catalog: store.clone(),
            matches: store.clone(),
        }
    }

    pub(crate) async fn postgres(config: &AppConfig) -> anyhow::Result<Self> {
        let pool = connect(config).await?;
        Ok(Self::from_store(&Arc::new(PgStore::new(pool))))
    }

    /// An in-memory store holding the registry file's sources. Nothing
    /// survives the process.
    pub(crate) async fn offline(config: &AppConfig) -> anyhow::Result<Self> {
        let registry = boothdb_core::load_sources(&config.sources_path)?;
        let store = Arc::new(MemoryStore::new());
        for entry in &registry.sources {
            store.upsert_source(entry).await?;
        }
        Ok(Self::from_store(&store))
    }
}
