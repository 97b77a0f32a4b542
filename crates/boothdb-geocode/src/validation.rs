//! Four validation layers applied around every provider result.
//!
//! 1. [`check_completeness`] runs before any provider is called.
//! 2. [`check_quality`] rejects degenerate results.
//! 3. [`distance_issue`] flags implausible moves away from a prior coordinate.
//! 4. [`score`] combines the above into a [`GeocodeConfidence`].

use std::sync::LazyLock;

use boothdb_core::similarity::normalize_text;
use boothdb_core::{
    haversine_meters, Coordinates, GeocodeConfidence, GeocodeProviderKind, GeocodeQuery,
    GeocodeResult,
};
use regex::Regex;

use crate::providers::{RawGeocode, ResultPrecision};

/// Results further than this from the record's prior coordinate are flagged.
pub const MAX_PRIOR_DISTANCE_METERS: f64 = 1_000.0;

/// Provider results scoring below this are rejected outright.
pub const MIN_MATCH_SCORE: f64 = 0.3;

pub const HIGH_CONFIDENCE_SCORE: f64 = 0.8;
pub const MEDIUM_CONFIDENCE_SCORE: f64 = 0.6;

static STREET_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+[A-Za-z]?\b").expect("valid regex"));

/// Why an input address was refused before geocoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncompleteAddress {
    Empty,
    NoStreetNumber,
    SameAsVenueName,
}

impl std::fmt::Display for IncompleteAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncompleteAddress::Empty => f.write_str("address is empty"),
            IncompleteAddress::NoStreetNumber => f.write_str("address has no street number"),
            IncompleteAddress::SameAsVenueName => f.write_str("address is just the venue name"),
        }
    }
}

/// Layer 1. Returns a completeness score in `0.5..=1.0` for a usable
/// address: 0.5 for the street line, plus 0.25 each for a city and a
/// country.
///
/// # Errors
///
/// Returns [`IncompleteAddress`] when the address is blank, carries no
/// street number, or merely repeats the venue name.
pub fn check_completeness(query: &GeocodeQuery) -> Result<f64, IncompleteAddress> {
    let address = normalize_text(&query.address);
    if address.is_empty() {
        return Err(IncompleteAddress::Empty);
    }
    if let Some(name) = &query.name {
        if normalize_text(name) == address {
            return Err(IncompleteAddress::SameAsVenueName);
        }
    }
    if !STREET_NUMBER.is_match(&query.address) {
        return Err(IncompleteAddress::NoStreetNumber);
    }

    let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    let mut completeness = 0.5;
    if present(&query.city) {
        completeness += 0.25;
    }
    if present(&query.country) {
        completeness += 0.25;
    }
    Ok(completeness)
}

/// Layer 2. Rejects country or region centroids, the `(0, 0)` placeholder,
/// and weak matches.
///
/// # Errors
///
/// Returns the rejection reason.
pub fn check_quality(raw: &RawGeocode) -> Result<(), String> {
    match raw.precision {
        ResultPrecision::Country => return Err("result is a country centroid".to_string()),
        ResultPrecision::Region => return Err("result is a region centroid".to_string()),
        _ => {}
    }
    if !Coordinates::new(raw.latitude, raw.longitude).is_plausible() {
        return Err(format!(
            "implausible coordinates ({}, {})",
            raw.latitude, raw.longitude
        ));
    }
    if raw.match_score < MIN_MATCH_SCORE {
        return Err(format!("match score {:.2} too low", raw.match_score));
    }
    Ok(())
}

/// Layer 3. Distance from the prior coordinate, and an issue when that
/// distance exceeds [`MAX_PRIOR_DISTANCE_METERS`].
#[must_use]
pub fn distance_issue(
    prior: Option<Coordinates>,
    result: Coordinates,
) -> (Option<f64>, Option<String>) {
    let Some(prior) = prior else {
        return (None, None);
    };
    let meters = haversine_meters(prior, result);
    let issue = (meters > MAX_PRIOR_DISTANCE_METERS)
        .then(|| format!("moved {meters:.0} m from the prior coordinate"));
    (Some(meters), issue)
}

/// Consistency with the prior coordinate: 1.0 within 100 m (or with no
/// prior), falling linearly to 0.5 at 1 km, and 0.0 beyond.
#[must_use]
pub fn distance_consistency(distance_meters: Option<f64>) -> f64 {
    match distance_meters {
        None => 1.0,
        Some(d) if d <= 100.0 => 1.0,
        Some(d) if d <= MAX_PRIOR_DISTANCE_METERS => 1.0 - 0.5 * (d - 100.0) / 900.0,
        Some(_) => 0.0,
    }
}

/// Layer 4. `0.5 * match + 0.3 * completeness + 0.2 * distance`.
///
/// `High` requires a score of at least 0.8 and no validation issues.
#[must_use]
pub fn classify(score: f64, issues: &[String]) -> GeocodeConfidence {
    if score >= HIGH_CONFIDENCE_SCORE && issues.is_empty() {
        GeocodeConfidence::High
    } else if score >= MEDIUM_CONFIDENCE_SCORE {
        GeocodeConfidence::Medium
    } else {
        GeocodeConfidence::Low
    }
}

/// Runs layers 3 and 4 over a result that passed layer 2.
#[must_use]
pub fn score(
    provider: GeocodeProviderKind,
    raw: RawGeocode,
    completeness: f64,
    prior: Option<Coordinates>,
) -> GeocodeResult {
    let coordinates = Coordinates::new(raw.latitude, raw.longitude);
    let mut issues = Vec::new();
    if raw.precision == ResultPrecision::Locality {
        issues.push("result resolved only to a locality".to_string());
    }
    let (distance, far) = distance_issue(prior, coordinates);
    issues.extend(far);

    let combined =
        0.5 * raw.match_score + 0.3 * completeness + 0.2 * distance_consistency(distance);
    let confidence = classify(combined, &issues);

    GeocodeResult {
        latitude: raw.latitude,
        longitude: raw.longitude,
        display_address: raw.display_address,
        provider,
        confidence,
        match_score: raw.match_score,
        validation_issues: issues,
        needs_review: confidence != GeocodeConfidence::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(precision: ResultPrecision, match_score: f64) -> RawGeocode {
        RawGeocode {
            latitude: 40.7466,
            longitude: -73.9886,
            display_address: "20 W 29th St, New York".to_string(),
            match_score,
            precision,
        }
    }

    fn query(address: &str, name: Option<&str>) -> GeocodeQuery {
        GeocodeQuery {
            address: address.to_string(),
            name: name.map(ToString::to_string),
            ..GeocodeQuery::default()
        }
    }

    #[test]
    fn address_equal_to_name_is_incomplete() {
        let q = query("Ace Hotel", Some("Ace Hotel"));
        assert_eq!(check_completeness(&q), Err(IncompleteAddress::SameAsVenueName));
    }

    #[test]
    fn numbered_name_still_counts_as_incomplete() {
        let q = query("123 Main St, Springfield", Some("123 Main St, Springfield"));
        assert_eq!(check_completeness(&q), Err(IncompleteAddress::SameAsVenueName));
    }

    #[test]
    fn address_without_number_is_incomplete() {
        let q = query("Main Street", Some("Joe's"));
        assert_eq!(check_completeness(&q), Err(IncompleteAddress::NoStreetNumber));
        assert_eq!(check_completeness(&query("  ", None)), Err(IncompleteAddress::Empty));
    }

    #[test]
    fn completeness_rewards_city_and_country() {
        let mut q = query("20 W 29th St", Some("Ace Hotel"));
        assert!((check_completeness(&q).unwrap() - 0.5).abs() < 1e-9);
        q.city = Some("New York".to_string());
        q.country = Some("US".to_string());
        assert!((check_completeness(&q).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn quality_rejects_centroids_and_weak_matches() {
        assert!(check_quality(&raw(ResultPrecision::Country, 0.9)).is_err());
        assert!(check_quality(&raw(ResultPrecision::Region, 0.9)).is_err());
        assert!(check_quality(&raw(ResultPrecision::Address, 0.1)).is_err());
        let mut null_island = raw(ResultPrecision::Address, 1.0);
        null_island.latitude = 0.0;
        null_island.longitude = 0.0;
        assert!(check_quality(&null_island).is_err());
        assert!(check_quality(&raw(ResultPrecision::Street, 0.75)).is_ok());
    }

    #[test]
    fn far_moves_are_flagged() {
        let result = Coordinates::new(40.7466, -73.9886);
        let (d, issue) = distance_issue(Some(Coordinates::new(40.7466, -73.9886)), result);
        assert!(d.unwrap() < 1.0);
        assert!(issue.is_none());

        let (_, issue) = distance_issue(Some(Coordinates::new(40.70, -73.99)), result);
        assert!(issue.is_some());
    }

    #[test]
    fn exact_address_scores_high() {
        let result = score(
            GeocodeProviderKind::Nominatim,
            raw(ResultPrecision::Address, 1.0),
            1.0,
            None,
        );
        assert_eq!(result.confidence, GeocodeConfidence::High);
        assert!(!result.needs_review);
    }

    #[test]
    fn issues_prevent_high_confidence() {
        let result = score(
            GeocodeProviderKind::Google,
            raw(ResultPrecision::Address, 1.0),
            1.0,
            Some(Coordinates::new(40.0, -73.0)),
        );
        assert!(!result.validation_issues.is_empty());
        assert_ne!(result.confidence, GeocodeConfidence::High);
        assert!(result.needs_review);
    }

    #[test]
    fn locality_result_is_never_high() {
        let result = score(
            GeocodeProviderKind::Mapbox,
            raw(ResultPrecision::Locality, 1.0),
            1.0,
            None,
        );
        assert_eq!(result.confidence, GeocodeConfidence::Medium);
    }

    #[test]
    fn distance_consistency_buckets() {
        assert!((distance_consistency(None) - 1.0).abs() < 1e-9);
        assert!((distance_consistency(Some(50.0)) - 1.0).abs() < 1e-9);
        assert!((distance_consistency(Some(1_000.0)) - 0.5).abs() < 1e-9);
        assert!(distance_consistency(Some(5_000.0)).abs() < 1e-9);
    }
}
