use boothdb_core::SourceEntry;
use sqlx::PgPool;

use crate::{sources::upsert_source, DbError};

/// Upsert the source registry into the database.
///
/// Returns the number of sources processed (inserted or updated). All
/// upserts run inside a single transaction; if any operation fails the
/// entire batch is rolled back. Learning state of existing sources is kept.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_sources(pool: &PgPool, entries: &[SourceEntry]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;

    for entry in entries {
        upsert_source(&mut *tx, entry).await?;
        count += 1;
    }

    tx.commit().await?;
    Ok(count)
}
