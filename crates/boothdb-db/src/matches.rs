//! Database operations for the `duplicate_matches` review queue.

use boothdb_core::{DuplicateMatch, MatchSide};
use sqlx::{types::Json, PgPool};

use crate::DbError;

fn side(primary: MatchSide) -> &'static str {
    match primary {
        MatchSide::A => "a",
        MatchSide::B => "b",
    }
}

/// Queue a pair for human review. Re-queuing the same pair refreshes the
/// stored scores and resets it to pending.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn save_duplicate_match(pool: &PgPool, duplicate: &DuplicateMatch) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO duplicate_matches (booth_a_key, booth_b_key, confidence_score, match_type, \
             recommended_action, merge_strategy, primary_booth, details) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (booth_a_key, booth_b_key) DO UPDATE SET \
             confidence_score = EXCLUDED.confidence_score, \
             match_type = EXCLUDED.match_type, \
             recommended_action = EXCLUDED.recommended_action, \
             merge_strategy = EXCLUDED.merge_strategy, \
             primary_booth = EXCLUDED.primary_booth, \
             details = EXCLUDED.details, \
             review_status = 'pending', \
             updated_at = NOW()",
    )
    .bind(duplicate.booth_a.booth_key())
    .bind(duplicate.booth_b.booth_key())
    .bind(duplicate.confidence_score)
    .bind(duplicate.match_type.as_str())
    .bind(duplicate.recommended_action.as_str())
    .bind(duplicate.merge_strategy.as_str())
    .bind(side(duplicate.primary_booth))
    .bind(Json(duplicate))
    .execute(pool)
    .await?;

    Ok(())
}
