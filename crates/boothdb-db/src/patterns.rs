//! Database operations for `learned_patterns` and
//! `pattern_validation_events`.

use boothdb_core::{LearnedPattern, PatternValidationEvent};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `learned_patterns` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PatternRow {
    pub id: Uuid,
    pub source_id: Uuid,
    pub field_name: String,
    pub pattern_type: String,
    pub selector: String,
    pub fallback_selectors: Vec<String>,
    pub extraction_method: String,
    pub attribute_name: Option<String>,
    pub validation_regex: Option<String>,
    pub required: bool,
    pub transform: Option<String>,
    pub base_confidence: f64,
    pub confidence_score: f64,
    pub success_count: i32,
    pub failure_count: i32,
    pub is_active: bool,
    pub learned_at: DateTime<Utc>,
    pub last_validated_at: Option<DateTime<Utc>>,
}

impl TryFrom<PatternRow> for LearnedPattern {
    type Error = DbError;

    fn try_from(row: PatternRow) -> Result<Self, Self::Error> {
        Ok(LearnedPattern {
            id: row.id,
            source_id: row.source_id,
            field_name: row
                .field_name
                .parse()
                .map_err(|e| DbError::decode("learned_patterns.field_name", e))?,
            pattern_type: row
                .pattern_type
                .parse()
                .map_err(|e| DbError::decode("learned_patterns.pattern_type", e))?,
            extraction_method: row
                .extraction_method
                .parse()
                .map_err(|e| DbError::decode("learned_patterns.extraction_method", e))?,
            selector: row.selector,
            fallback_selectors: row.fallback_selectors,
            attribute_name: row.attribute_name,
            validation_regex: row.validation_regex,
            required: row.required,
            transform: row.transform,
            base_confidence: row.base_confidence,
            confidence_score: row.confidence_score,
            success_count: u32::try_from(row.success_count).unwrap_or(0),
            failure_count: u32::try_from(row.failure_count).unwrap_or(0),
            is_active: row.is_active,
            learned_at: row.learned_at,
            last_validated_at: row.last_validated_at,
        })
    }
}

const PATTERN_COLUMNS: &str = "id, source_id, field_name, pattern_type, selector, \
     fallback_selectors, extraction_method, attribute_name, validation_regex, required, \
     transform, base_confidence, confidence_score, success_count, failure_count, is_active, \
     learned_at, last_validated_at";

fn to_db_count(count: u32) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns the active patterns of one source.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::Decode`] if a
/// stored enum value is unknown.
pub async fn list_active_patterns(
    pool: &PgPool,
    source_id: Uuid,
) -> Result<Vec<LearnedPattern>, DbError> {
    let rows = sqlx::query_as::<_, PatternRow>(&format!(
        "SELECT {PATTERN_COLUMNS} FROM learned_patterns \
         WHERE source_id = $1 AND is_active = true \
         ORDER BY field_name, confidence_score DESC"
    ))
    .bind(source_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(LearnedPattern::try_from).collect()
}

/// Upsert patterns keyed by `(source_id, field_name, selector)`.
///
/// Re-learning an existing rule refreshes its definition and reactivates it;
/// its counters are kept and its confidence never drops below the stored
/// value. All rows are written in one transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any write fails; the batch is rolled back.
pub async fn upsert_patterns(pool: &PgPool, patterns: &[LearnedPattern]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;

    for pattern in patterns {
        sqlx::query(
            "INSERT INTO learned_patterns (id, source_id, field_name, pattern_type, selector, \
                 fallback_selectors, extraction_method, attribute_name, validation_regex, \
                 required, transform, base_confidence, confidence_score, success_count, \
                 failure_count, is_active, learned_at, last_validated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
             ON CONFLICT (source_id, field_name, selector) DO UPDATE SET \
                 pattern_type = EXCLUDED.pattern_type, \
                 fallback_selectors = EXCLUDED.fallback_selectors, \
                 extraction_method = EXCLUDED.extraction_method, \
                 attribute_name = EXCLUDED.attribute_name, \
                 validation_regex = EXCLUDED.validation_regex, \
                 required = EXCLUDED.required, \
                 transform = EXCLUDED.transform, \
                 base_confidence = EXCLUDED.base_confidence, \
                 confidence_score = GREATEST(learned_patterns.confidence_score, EXCLUDED.confidence_score), \
                 is_active = true, \
                 learned_at = EXCLUDED.learned_at",
        )
        .bind(pattern.id)
        .bind(pattern.source_id)
        .bind(pattern.field_name.as_str())
        .bind(pattern.pattern_type.as_str())
        .bind(&pattern.selector)
        .bind(&pattern.fallback_selectors)
        .bind(pattern.extraction_method.as_str())
        .bind(&pattern.attribute_name)
        .bind(&pattern.validation_regex)
        .bind(pattern.required)
        .bind(&pattern.transform)
        .bind(pattern.base_confidence)
        .bind(pattern.confidence_score)
        .bind(to_db_count(pattern.success_count))
        .bind(to_db_count(pattern.failure_count))
        .bind(pattern.is_active)
        .bind(pattern.learned_at)
        .bind(pattern.last_validated_at)
        .execute(&mut *tx)
        .await?;

        count += 1;
    }

    tx.commit().await?;
    Ok(count)
}

/// Append validation events and revise each affected pattern.
///
/// Each pattern row is locked, revised in memory with
/// [`LearnedPattern::apply_validation`], and written back, so the
/// confidence formula lives in one place. Events for patterns that no
/// longer exist are skipped.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any write fails; the batch is rolled back.
pub async fn record_pattern_validations(
    pool: &PgPool,
    events: &[PatternValidationEvent],
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    for event in events {
        let row = sqlx::query_as::<_, PatternRow>(&format!(
            "SELECT {PATTERN_COLUMNS} FROM learned_patterns WHERE id = $1 FOR UPDATE"
        ))
        .bind(event.pattern_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tracing::warn!(pattern_id = %event.pattern_id, "validation event for unknown pattern");
            continue;
        };
        let mut pattern = LearnedPattern::try_from(row)?;

        sqlx::query(
            "INSERT INTO pattern_validation_events (pattern_id, source_id, field_name, success, \
                 extracted_value, selector_index, latency_micros, observed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(event.pattern_id)
        .bind(event.source_id)
        .bind(event.field_name.as_str())
        .bind(event.success)
        .bind(&event.extracted_value)
        .bind(event.selector_index.and_then(|i| i32::try_from(i).ok()))
        .bind(i64::try_from(event.latency_micros).unwrap_or(i64::MAX))
        .bind(event.observed_at)
        .execute(&mut *tx)
        .await?;

        pattern.apply_validation(event.success, event.observed_at);

        sqlx::query(
            "UPDATE learned_patterns SET \
                 success_count = $2, \
                 failure_count = $3, \
                 confidence_score = $4, \
                 is_active = $5, \
                 last_validated_at = $6 \
             WHERE id = $1",
        )
        .bind(pattern.id)
        .bind(to_db_count(pattern.success_count))
        .bind(to_db_count(pattern.failure_count))
        .bind(pattern.confidence_score)
        .bind(pattern.is_active)
        .bind(pattern.last_validated_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
