//! Database operations for the `sources` table.

use boothdb_core::{ExtractionMode, SourceConfig, SourceEntry, SourceStatusUpdate};
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `sources` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub url: String,
    pub source_type: String,
    pub extraction_mode: String,
    pub pattern_learning_status: String,
    pub pattern_learned_at: Option<DateTime<Utc>>,
    pub enabled: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SourceRow> for SourceConfig {
    type Error = DbError;

    fn try_from(row: SourceRow) -> Result<Self, Self::Error> {
        Ok(SourceConfig {
            id: row.id,
            source_type: row
                .source_type
                .parse()
                .map_err(|e| DbError::decode("sources.source_type", e))?,
            extraction_mode: row
                .extraction_mode
                .parse()
                .map_err(|e| DbError::decode("sources.extraction_mode", e))?,
            pattern_learning_status: row
                .pattern_learning_status
                .parse()
                .map_err(|e| DbError::decode("sources.pattern_learning_status", e))?,
            pattern_learned_at: row.pattern_learned_at,
            enabled: row.enabled,
            name: row.name,
            slug: row.slug,
            url: row.url,
        })
    }
}

const SOURCE_COLUMNS: &str = "id, name, slug, url, source_type, extraction_mode, \
     pattern_learning_status, pattern_learned_at, enabled, notes, created_at, updated_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns every registered source, ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::Decode`] if a
/// stored enum value is unknown.
pub async fn list_sources(pool: &PgPool) -> Result<Vec<SourceConfig>, DbError> {
    let rows = sqlx::query_as::<_, SourceRow>(&format!(
        "SELECT {SOURCE_COLUMNS} FROM sources ORDER BY name"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(SourceConfig::try_from).collect()
}

/// Returns a single source by slug, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::Decode`] if a
/// stored enum value is unknown.
pub async fn get_source_by_slug(pool: &PgPool, slug: &str) -> Result<Option<SourceConfig>, DbError> {
    let row = sqlx::query_as::<_, SourceRow>(&format!(
        "SELECT {SOURCE_COLUMNS} FROM sources WHERE slug = $1"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    row.map(SourceConfig::try_from).transpose()
}

/// Insert a registry entry, or refresh the configured fields of an existing
/// one. Learning status and `pattern_learned_at` are never touched here.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_source<'e, E>(executor: E, entry: &SourceEntry) -> Result<SourceConfig, DbError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, SourceRow>(&format!(
        "INSERT INTO sources (id, name, slug, url, source_type, extraction_mode, enabled, notes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (slug) DO UPDATE SET \
             name = EXCLUDED.name, \
             url = EXCLUDED.url, \
             source_type = EXCLUDED.source_type, \
             extraction_mode = EXCLUDED.extraction_mode, \
             enabled = EXCLUDED.enabled, \
             notes = EXCLUDED.notes, \
             updated_at = NOW() \
         RETURNING {SOURCE_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&entry.name)
    .bind(entry.slug())
    .bind(&entry.url)
    .bind(entry.source_type.as_str())
    .bind(entry.extraction_mode.as_str())
    .bind(entry.enabled)
    .bind(&entry.notes)
    .fetch_one(executor)
    .await?;

    SourceConfig::try_from(row)
}

/// Write the learning state of a source. A `None` extraction mode keeps the
/// stored mode.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no source has this id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_learning_status(
    pool: &PgPool,
    source_id: Uuid,
    update: &SourceStatusUpdate,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE sources SET \
             pattern_learning_status = $2, \
             extraction_mode = COALESCE($3, extraction_mode), \
             pattern_learned_at = COALESCE($4, pattern_learned_at), \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(source_id)
    .bind(update.pattern_learning_status.as_str())
    .bind(update.extraction_mode.map(ExtractionMode::as_str))
    .bind(update.pattern_learned_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound(format!("source {source_id}")));
    }
    Ok(())
}
