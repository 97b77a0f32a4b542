//! Pairwise booth comparison.

use boothdb_core::records::canonical_country;
use boothdb_core::similarity::{normalize_text, normalized_similarity};
use boothdb_core::{
    haversine_meters, CandidateRecord, DuplicateMatch, MatchSide, MatchType, MergeStrategy,
    RecommendedAction,
};

use crate::conflicts::detect_conflicts;
use crate::trust::TrustTable;

pub const NAME_WEIGHT: f64 = 0.4;
pub const ADDRESS_WEIGHT: f64 = 0.3;
pub const LOCATION_WEIGHT: f64 = 0.2;
pub const DISTANCE_WEIGHT: f64 = 0.1;

pub const EXACT_THRESHOLD: f64 = 95.0;
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 80.0;
pub const PROBABLE_THRESHOLD: f64 = 60.0;
pub const REVIEW_THRESHOLD: f64 = 40.0;

/// Component scores for one pair, each 0-100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonScores {
    pub name: f64,
    pub address: Option<f64>,
    pub location: Option<f64>,
    pub distance_meters: Option<f64>,
    pub distance: Option<f64>,
    pub confidence: f64,
}

fn text_similarity(a: &str, b: &str) -> f64 {
    normalized_similarity(&normalize_text(a), &normalize_text(b))
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Average of city-name similarity and an exact canonical-country match
/// (100 or 0). When only one side of that average is available on both
/// records it stands alone; when neither is, there is no location score.
#[must_use]
pub fn location_similarity(a: &CandidateRecord, b: &CandidateRecord) -> Option<f64> {
    let city = match (present(a.city.as_ref()), present(b.city.as_ref())) {
        (Some(x), Some(y)) => Some(text_similarity(x, y)),
        _ => None,
    };
    let country = match (
        present(a.country.as_ref()).and_then(canonical_country),
        present(b.country.as_ref()).and_then(canonical_country),
    ) {
        (Some(x), Some(y)) => Some(if x == y { 100.0 } else { 0.0 }),
        _ => None,
    };
    match (city, country) {
        (Some(c), Some(k)) => Some((c + k) / 2.0),
        (Some(s), None) | (None, Some(s)) => Some(s),
        (None, None) => None,
    }
}

/// Bucketed distance score: <10 m is 100, <50 m 80, <200 m 50,
/// <1000 m 20, anything further 0.
#[must_use]
pub fn distance_score(meters: f64) -> f64 {
    if meters < 10.0 {
        100.0
    } else if meters < 50.0 {
        80.0
    } else if meters < 200.0 {
        50.0
    } else if meters < 1_000.0 {
        20.0
    } else {
        0.0
    }
}

/// Weighted average of the available components, with the weights in use
/// renormalized to sum to 1.
#[must_use]
pub fn composite_confidence(
    name: f64,
    address: Option<f64>,
    location: Option<f64>,
    distance: Option<f64>,
) -> f64 {
    let mut weighted = name * NAME_WEIGHT;
    let mut total_weight = NAME_WEIGHT;
    for (score, weight) in [
        (address, ADDRESS_WEIGHT),
        (location, LOCATION_WEIGHT),
        (distance, DISTANCE_WEIGHT),
    ] {
        if let Some(score) = score {
            weighted += score * weight;
            total_weight += weight;
        }
    }
    weighted / total_weight
}

#[must_use]
pub fn score_pair(a: &CandidateRecord, b: &CandidateRecord) -> ComparisonScores {
    let name = text_similarity(&a.name, &b.name);
    let address = (!a.address.trim().is_empty() && !b.address.trim().is_empty())
        .then(|| text_similarity(&a.address, &b.address));
    let location = location_similarity(a, b);
    let distance_meters = match (a.coordinates(), b.coordinates()) {
        (Some(x), Some(y)) => Some(haversine_meters(x, y)),
        _ => None,
    };
    let distance = distance_meters.map(distance_score);

    ComparisonScores {
        name,
        address,
        location,
        distance_meters,
        distance,
        confidence: composite_confidence(name, address, location, distance),
    }
}

/// Match band for a composite confidence; `None` below 40.
#[must_use]
pub fn classify(confidence: f64) -> Option<(MatchType, RecommendedAction)> {
    if confidence >= EXACT_THRESHOLD {
        Some((MatchType::Exact, RecommendedAction::Merge))
    } else if confidence >= HIGH_CONFIDENCE_THRESHOLD {
        Some((MatchType::HighConfidence, RecommendedAction::Merge))
    } else if confidence >= PROBABLE_THRESHOLD {
        Some((MatchType::Probable, RecommendedAction::ManualReview))
    } else if confidence >= REVIEW_THRESHOLD {
        Some((MatchType::ManualReview, RecommendedAction::ManualReview))
    } else {
        None
    }
}

/// Compare two records with whatever coordinates they already carry.
///
/// Returns `None` when the pair is not a duplicate. Conflicting fields
/// force manual review unless the pair scores as exact.
#[must_use]
pub fn compare_booths(
    a: &CandidateRecord,
    b: &CandidateRecord,
    trust: &TrustTable,
) -> Option<DuplicateMatch> {
    let scores = score_pair(a, b);
    let (match_type, mut action) = classify(scores.confidence)?;

    let conflicts = detect_conflicts(a, b);
    if !conflicts.is_empty() && scores.confidence < EXACT_THRESHOLD {
        action = RecommendedAction::ManualReview;
    }

    let tier_a = trust.tier(&a.source_name);
    let tier_b = trust.tier(&b.source_name);
    let (primary_booth, merge_strategy) = if tier_a == tier_b {
        (MatchSide::A, MergeStrategy::MergeFields)
    } else if tier_a > tier_b {
        (MatchSide::A, MergeStrategy::KeepPrimary)
    } else {
        (MatchSide::B, MergeStrategy::KeepPrimary)
    };

    Some(DuplicateMatch {
        booth_a: a.clone(),
        booth_b: b.clone(),
        confidence_score: scores.confidence,
        match_type,
        name_similarity: scores.name,
        address_similarity: scores.address,
        location_similarity: scores.location,
        distance_meters: scores.distance_meters,
        recommended_action: action,
        merge_strategy,
        primary_booth,
        conflicts,
    })
}

#[cfg(test)]
#[path = "compare_test.rs"]
mod tests;
