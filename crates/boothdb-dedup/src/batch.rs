//! Batch deduplication and reconciliation against the stored catalog.
//!
//! Records live in an arena (`Vec<CandidateRecord>`) with a separate set of
//! absorbed indices; a merge replaces the earlier record in place and marks
//! the later one absorbed. Passes repeat until one makes no merge, so a
//! deduplicated batch is a fixed point of the engine.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use boothdb_core::similarity::prefix_similarity;
use boothdb_core::{
    CandidateRecord, CatalogEntry, CatalogRepository, Coordinates, DuplicateMatch,
    GeocodeConfidence, GeocodeLookup, GeocodeQuery, MatchRepository, RecommendedAction,
};
use serde::Serialize;

use crate::compare::compare_booths;
use crate::merge::merge_match;
use crate::trust::TrustTable;

/// Leading characters of each normalized name used by the cheap pre-filter.
pub const PREFIX_CHARS: usize = 20;

/// Pairs whose name prefixes score below this are never fully compared.
pub const PREFIX_THRESHOLD: f64 = 30.0;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupOutcome {
    pub records: Vec<CandidateRecord>,
    /// Matches merged automatically, in merge order.
    pub merged: Vec<DuplicateMatch>,
    /// Ambiguous pairs among the surviving records.
    pub review: Vec<DuplicateMatch>,
    pub passes: usize,
    pub comparisons: usize,
    pub skipped: usize,
    pub geocoded: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub merged_into_catalog: usize,
    pub queued_for_review: usize,
    pub errors: Vec<String>,
}

/// Coordinates looked up during a run, keyed by the full address text.
/// Failed lookups are cached too so an address is geocoded at most once.
type GeocodeCache = HashMap<String, Option<Coordinates>>;

pub struct DedupEngine {
    trust: TrustTable,
    geocoder: Option<Arc<dyn GeocodeLookup>>,
}

impl DedupEngine {
    #[must_use]
    pub fn new(trust: TrustTable) -> Self {
        Self {
            trust,
            geocoder: None,
        }
    }

    /// Geocode records on demand when a pair lacks coordinates.
    #[must_use]
    pub fn with_geocoder(mut self, geocoder: Arc<dyn GeocodeLookup>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    /// Deduplicate one batch of records.
    pub async fn deduplicate(&self, records: Vec<CandidateRecord>) -> DedupOutcome {
        let mut arena = records;
        let mut absorbed: HashSet<usize> = HashSet::new();
        let mut cache = GeocodeCache::new();
        let mut outcome = DedupOutcome::default();

        loop {
            outcome.passes += 1;
            let mut review = Vec::new();
            let merges_before = outcome.merged.len();

            for i in 0..arena.len() {
                if absorbed.contains(&i) {
                    continue;
                }
                for j in (i + 1)..arena.len() {
                    if absorbed.contains(&j) {
                        continue;
                    }
                    if !worth_comparing(&arena[i], &arena[j]) {
                        outcome.skipped += 1;
                        continue;
                    }
                    outcome.geocoded += self
                        .ensure_coordinates(&mut arena, &[i, j], &mut cache)
                        .await;
                    outcome.comparisons += 1;

                    let Some(duplicate) = compare_booths(&arena[i], &arena[j], &self.trust) else {
                        continue;
                    };
                    match duplicate.recommended_action {
                        RecommendedAction::Merge => {
                            tracing::debug!(
                                a = %arena[i].name,
                                b = %arena[j].name,
                                confidence = duplicate.confidence_score,
                                strategy = %duplicate.merge_strategy,
                                "merging duplicate booths"
                            );
                            arena[i] = merge_match(&duplicate);
                            absorbed.insert(j);
                            outcome.merged.push(duplicate);
                        }
                        RecommendedAction::ManualReview => review.push(duplicate),
                        RecommendedAction::KeepBoth => {}
                    }
                }
            }

            if outcome.merged.len() == merges_before {
                outcome.review = review;
                break;
            }
        }

        outcome.records = arena
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !absorbed.contains(i))
            .map(|(_, record)| record)
            .collect();

        tracing::info!(
            kept = outcome.records.len(),
            merged = outcome.merged.len(),
            review = outcome.review.len(),
            passes = outcome.passes,
            "batch deduplication complete"
        );
        outcome
    }

    /// Compare each record against existing catalog records in the same
    /// country. Automatic merges update the catalog record; ambiguous pairs
    /// are queued for review and the new record is still inserted.
    pub async fn reconcile_with_catalog(
        &self,
        records: Vec<CandidateRecord>,
        catalog: &dyn CatalogRepository,
        matches: &dyn MatchRepository,
    ) -> CatalogOutcome {
        let mut outcome = CatalogOutcome::default();
        let mut by_country: HashMap<Option<String>, Vec<CatalogEntry>> = HashMap::new();
        let mut cache = GeocodeCache::new();
        let mut to_insert = Vec::new();

        for mut record in records {
            let country = record.canonical_country();
            if !by_country.contains_key(&country) {
                let entries = match catalog.catalog_for_country(country.as_deref()).await {
                    Ok(entries) => entries,
                    Err(e) => {
                        tracing::warn!(country = ?country, error = %e, "failed to load catalog");
                        outcome.errors.push(format!("load catalog for {country:?}: {e}"));
                        Vec::new()
                    }
                };
                by_country.insert(country.clone(), entries);
            }
            let entries = by_country.entry(country).or_default();

            // Distance can only be scored against located catalog booths.
            let has_located_candidate = entries.iter().any(|entry| {
                entry.record.coordinates().is_some() && worth_comparing(&record, &entry.record)
            });
            if has_located_candidate {
                self.ensure_coordinates(std::slice::from_mut(&mut record), &[0], &mut cache)
                    .await;
            }

            let mut best: Option<(usize, DuplicateMatch)> = None;
            for (idx, entry) in entries.iter().enumerate() {
                if !worth_comparing(&record, &entry.record) {
                    continue;
                }
                if let Some(m) = compare_booths(&entry.record, &record, &self.trust) {
                    if best
                        .as_ref()
                        .is_none_or(|(_, b)| m.confidence_score > b.confidence_score)
                    {
                        best = Some((idx, m));
                    }
                }
            }

            match best {
                Some((idx, m)) if m.recommended_action == RecommendedAction::Merge => {
                    let merged = merge_match(&m);
                    let id = entries[idx].id;
                    match catalog.update_booth(id, &merged).await {
                        Ok(()) => {
                            tracing::debug!(%id, name = %merged.name, "merged into catalog booth");
                            entries[idx].record = merged;
                            outcome.merged_into_catalog += 1;
                        }
                        Err(e) => {
                            tracing::warn!(%id, error = %e, "failed to update catalog booth");
                            outcome.errors.push(format!("update booth {id}: {e}"));
                        }
                    }
                }
                Some((_, m)) if m.recommended_action == RecommendedAction::ManualReview => {
                    self.queue(&m, matches, &mut outcome).await;
                    to_insert.push(record);
                }
                _ => to_insert.push(record),
            }
        }

        if !to_insert.is_empty() {
            match catalog.upsert_booths(&to_insert).await {
                Ok((inserted, updated)) => {
                    outcome.inserted = inserted;
                    outcome.updated = updated;
                }
                Err(e) => {
                    tracing::warn!(count = to_insert.len(), error = %e, "failed to upsert booths");
                    outcome.errors.push(format!("upsert booths: {e}"));
                }
            }
        }

        tracing::info!(
            inserted = outcome.inserted,
            updated = outcome.updated,
            merged = outcome.merged_into_catalog,
            review = outcome.queued_for_review,
            "catalog reconciliation complete"
        );
        outcome
    }

    /// Queue every ambiguous pair from a batch pass for review.
    pub async fn queue_reviews(
        &self,
        review: &[DuplicateMatch],
        matches: &dyn MatchRepository,
    ) -> CatalogOutcome {
        let mut outcome = CatalogOutcome::default();
        for m in review {
            self.queue(m, matches, &mut outcome).await;
        }
        outcome
    }

    async fn queue(
        &self,
        duplicate: &DuplicateMatch,
        matches: &dyn MatchRepository,
        outcome: &mut CatalogOutcome,
    ) {
        tracing::info!(
            a = %duplicate.booth_a.name,
            b = %duplicate.booth_b.name,
            confidence = duplicate.confidence_score,
            match_type = %duplicate.match_type,
            conflicts = duplicate.conflicts.len(),
            "duplicate routed to manual review"
        );
        match matches.save_for_review(duplicate).await {
            Ok(()) => outcome.queued_for_review += 1,
            Err(e) => {
                tracing::warn!(error = %e, "failed to queue duplicate for review");
                outcome.errors.push(format!("queue review: {e}"));
            }
        }
    }

    /// Geocode the given arena slots that lack coordinates, caching results
    /// onto the records. Only runs when every slot has an address. Returns
    /// the number of provider lookups made.
    async fn ensure_coordinates(
        &self,
        arena: &mut [CandidateRecord],
        slots: &[usize],
        cache: &mut GeocodeCache,
    ) -> usize {
        let Some(geocoder) = &self.geocoder else {
            return 0;
        };
        if slots.iter().all(|&s| arena[s].coordinates().is_some())
            || slots.iter().any(|&s| arena[s].address.trim().is_empty())
        {
            return 0;
        }

        let mut lookups = 0;
        for &slot in slots {
            if arena[slot].coordinates().is_some() {
                continue;
            }
            let query = GeocodeQuery::from_record(&arena[slot]);
            let key = query.full_address().to_lowercase();
            let coordinates = if let Some(cached) = cache.get(&key) {
                *cached
            } else {
                lookups += 1;
                let resolved = geocoder
                    .geocode(&query)
                    .await
                    .filter(|r| r.confidence >= GeocodeConfidence::Medium)
                    .map(|r| r.coordinates());
                cache.insert(key, resolved);
                resolved
            };
            if let Some(c) = coordinates {
                arena[slot].set_coordinates(c);
            }
        }
        lookups
    }
}

/// Cheap rejects: different canonical countries, or name prefixes too
/// dissimilar to be worth a full comparison.
fn worth_comparing(a: &CandidateRecord, b: &CandidateRecord) -> bool {
    if let (Some(ca), Some(cb)) = (a.canonical_country(), b.canonical_country()) {
        if ca != cb {
            return false;
        }
    }
    prefix_similarity(&a.name, &b.name, PREFIX_CHARS) >= PREFIX_THRESHOLD
}

#[cfg(test)]
#[path = "batch_test.rs"]
mod tests;
