//! Database operations for the `booths` catalog.

use boothdb_core::{CandidateRecord, CatalogEntry};
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `booths` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BoothRow {
    pub id: Uuid,
    pub booth_key: String,
    pub record: Json<CandidateRecord>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl From<BoothRow> for CatalogEntry {
    fn from(row: BoothRow) -> Self {
        CatalogEntry {
            id: row.id,
            record: row.record.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns the catalog records of one canonical country. `None` selects the
/// records stored without a country.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_booths_by_country(
    pool: &PgPool,
    country: Option<&str>,
) -> Result<Vec<CatalogEntry>, DbError> {
    let rows = sqlx::query_as::<_, BoothRow>(
        "SELECT id, booth_key, record, first_seen_at, last_seen_at \
         FROM booths \
         WHERE country IS NOT DISTINCT FROM $1 \
         ORDER BY first_seen_at, id",
    )
    .bind(country)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(CatalogEntry::from).collect())
}

/// Upsert records by booth key. A record seen again replaces the stored
/// copy and bumps `last_seen_at`.
///
/// Returns `(inserted, updated)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any write fails; the batch is rolled back.
pub async fn upsert_booths(
    pool: &PgPool,
    records: &[CandidateRecord],
) -> Result<(usize, usize), DbError> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;
    let mut updated = 0usize;

    for record in records {
        let is_new: bool = sqlx::query_scalar(
            "INSERT INTO booths (id, booth_key, name, address, city, country, latitude, \
                 longitude, source_name, record) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (booth_key) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 address = EXCLUDED.address, \
                 city = EXCLUDED.city, \
                 country = EXCLUDED.country, \
                 latitude = EXCLUDED.latitude, \
                 longitude = EXCLUDED.longitude, \
                 source_name = EXCLUDED.source_name, \
                 record = EXCLUDED.record, \
                 last_seen_at = NOW(), \
                 updated_at = NOW() \
             RETURNING (xmax = 0) AS is_new",
        )
        .bind(Uuid::new_v4())
        .bind(record.booth_key())
        .bind(&record.name)
        .bind(&record.address)
        .bind(&record.city)
        .bind(record.canonical_country())
        .bind(record.latitude)
        .bind(record.longitude)
        .bind(&record.source_name)
        .bind(Json(record))
        .fetch_one(&mut *tx)
        .await?;

        if is_new {
            inserted += 1;
        } else {
            updated += 1;
        }
    }

    tx.commit().await?;
    Ok((inserted, updated))
}

/// Replace one catalog record in place, typically with the product of a
/// merge.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no booth has this id, or
/// [`DbError::Sqlx`] if the update fails (including a booth-key collision
/// with another row).
pub async fn update_booth(pool: &PgPool, id: Uuid, record: &CandidateRecord) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE booths SET \
             booth_key = $2, \
             name = $3, \
             address = $4, \
             city = $5, \
             country = $6, \
             latitude = $7, \
             longitude = $8, \
             source_name = $9, \
             record = $10, \
             last_seen_at = NOW(), \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(record.booth_key())
    .bind(&record.name)
    .bind(&record.address)
    .bind(&record.city)
    .bind(record.canonical_country())
    .bind(record.latitude)
    .bind(record.longitude)
    .bind(&record.source_name)
    .bind(Json(record))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound(format!("booth {id}")));
    }
    Ok(())
}
