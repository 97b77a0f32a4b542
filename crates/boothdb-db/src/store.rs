//! Postgres-backed implementation of the repository ports.

use async_trait::async_trait;
use boothdb_core::{
    CandidateRecord, CatalogEntry, CatalogRepository, DuplicateMatch, LearnedPattern,
    MatchRepository, PatternRepository, PatternValidationEvent, RepositoryError, SourceConfig,
    SourceEntry, SourceRepository, SourceStatusUpdate,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{booths, matches, patterns, sources};

/// Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SourceRepository for PgStore {
    async fn list_sources(&self) -> Result<Vec<SourceConfig>, RepositoryError> {
        Ok(sources::list_sources(&self.pool).await?)
    }

    async fn get_source_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<SourceConfig>, RepositoryError> {
        Ok(sources::get_source_by_slug(&self.pool, slug).await?)
    }

    async fn upsert_source(&self, entry: &SourceEntry) -> Result<SourceConfig, RepositoryError> {
        Ok(sources::upsert_source(&self.pool, entry).await?)
    }

    async fn update_learning_status(
        &self,
        source_id: Uuid,
        update: &SourceStatusUpdate,
    ) -> Result<(), RepositoryError> {
        Ok(sources::update_learning_status(&self.pool, source_id, update).await?)
    }
}

#[async_trait]
impl PatternRepository for PgStore {
    async fn active_patterns(
        &self,
        source_id: Uuid,
    ) -> Result<Vec<LearnedPattern>, RepositoryError> {
        Ok(patterns::list_active_patterns(&self.pool, source_id).await?)
    }

    async fn upsert_patterns(&self, learned: &[LearnedPattern]) -> Result<usize, RepositoryError> {
        Ok(patterns::upsert_patterns(&self.pool, learned).await?)
    }

    async fn record_validations(
        &self,
        events: &[PatternValidationEvent],
    ) -> Result<(), RepositoryError> {
        Ok(patterns::record_pattern_validations(&self.pool, events).await?)
    }
}

#[async_trait]
impl MatchRepository for PgStore {
    async fn save_for_review(&self, duplicate: &DuplicateMatch) -> Result<(), RepositoryError> {
        Ok(matches::save_duplicate_match(&self.pool, duplicate).await?)
    }
}

#[async_trait]
impl CatalogRepository for PgStore {
    async fn catalog_for_country(
        &self,
        country: Option<&str>,
    ) -> Result<Vec<CatalogEntry>, RepositoryError> {
        Ok(booths::get_booths_by_country(&self.pool, country).await?)
    }

    async fn upsert_booths(
        &self,
        records: &[CandidateRecord],
    ) -> Result<(usize, usize), RepositoryError> {
        Ok(booths::upsert_booths(&self.pool, records).await?)
    }

    async fn update_booth(
        &self,
        id: Uuid,
        record: &CandidateRecord,
    ) -> Result<(), RepositoryError> {
        Ok(booths::update_booth(&self.pool, id, record).await?)
    }
}
