//! In-memory implementation of the repository ports, for tests and dry runs.
//!
//! Mirrors the Postgres semantics: patterns upsert on
//! `(source_id, field_name, selector)`, booths upsert on booth key, and
//! review entries on the `(booth_a, booth_b)` key pair.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use boothdb_core::{
    CandidateRecord, CatalogEntry, CatalogRepository, DuplicateMatch, LearnedPattern,
    MatchRepository, PatternRepository, PatternValidationEvent, RepositoryError, SourceConfig,
    SourceEntry, SourceRepository, SourceStatusUpdate,
};
use uuid::Uuid;

#[derive(Debug)]
pub struct MemoryStore {
    sources: RwLock<HashMap<Uuid, SourceConfig>>,
    patterns: RwLock<Vec<LearnedPattern>>,
    events: RwLock<Vec<PatternValidationEvent>>,
    booths: RwLock<Vec<CatalogEntry>>,
    reviews: RwLock<Vec<DuplicateMatch>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
            patterns: RwLock::new(Vec::new()),
            events: RwLock::new(Vec::new()),
            booths: RwLock::new(Vec::new()),
            reviews: RwLock::new(Vec::new()),
        }
    }

    /// Insert or replace a source as-is, bypassing registry semantics.
    pub fn insert_source(&self, source: SourceConfig) {
        write(&self.sources).insert(source.id, source);
    }

    #[must_use]
    pub fn source(&self, id: Uuid) -> Option<SourceConfig> {
        read(&self.sources).get(&id).cloned()
    }

    /// Every stored pattern of a source, active or not.
    #[must_use]
    pub fn all_patterns(&self, source_id: Uuid) -> Vec<LearnedPattern> {
        read(&self.patterns)
            .iter()
            .filter(|p| p.source_id == source_id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn validation_events(&self) -> Vec<PatternValidationEvent> {
        read(&self.events).clone()
    }

    /// The whole catalog, in insertion order.
    #[must_use]
    pub fn catalog(&self) -> Vec<CatalogEntry> {
        read(&self.booths).clone()
    }

    #[must_use]
    pub fn review_queue(&self) -> Vec<DuplicateMatch> {
        read(&self.reviews).clone()
    }
}

#[async_trait]
impl SourceRepository for MemoryStore {
    async fn list_sources(&self) -> Result<Vec<SourceConfig>, RepositoryError> {
        let mut sources: Vec<SourceConfig> = read(&self.sources).values().cloned().collect();
        sources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sources)
    }

    async fn get_source_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<SourceConfig>, RepositoryError> {
        Ok(read(&self.sources)
            .values()
            .find(|s| s.slug == slug)
            .cloned())
    }

    async fn upsert_source(&self, entry: &SourceEntry) -> Result<SourceConfig, RepositoryError> {
        let mut sources = write(&self.sources);
        let slug = entry.slug();

        if let Some(existing) = sources.values_mut().find(|s| s.slug == slug) {
            existing.name.clone_from(&entry.name);
            existing.url.clone_from(&entry.url);
            existing.source_type = entry.source_type;
            existing.extraction_mode = entry.extraction_mode;
            existing.enabled = entry.enabled;
            return Ok(existing.clone());
        }

        let source = SourceConfig::from_entry(entry);
        sources.insert(source.id, source.clone());
        Ok(source)
    }

    async fn update_learning_status(
        &self,
        source_id: Uuid,
        update: &SourceStatusUpdate,
    ) -> Result<(), RepositoryError> {
        let mut sources = write(&self.sources);
        let source = sources
            .get_mut(&source_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("source {source_id}")))?;

        source.pattern_learning_status = update.pattern_learning_status;
        if let Some(mode) = update.extraction_mode {
            source.extraction_mode = mode;
        }
        if update.pattern_learned_at.is_some() {
            source.pattern_learned_at = update.pattern_learned_at;
        }
        Ok(())
    }
}

#[async_trait]
impl PatternRepository for MemoryStore {
    async fn active_patterns(
        &self,
        source_id: Uuid,
    ) -> Result<Vec<LearnedPattern>, RepositoryError> {
        Ok(read(&self.patterns)
            .iter()
            .filter(|p| p.source_id == source_id && p.is_active)
            .cloned()
            .collect())
    }

    async fn upsert_patterns(&self, learned: &[LearnedPattern]) -> Result<usize, RepositoryError> {
        let mut stored = write(&self.patterns);

        for pattern in learned {
            let existing = stored.iter_mut().find(|p| {
                p.source_id == pattern.source_id
                    && p.field_name == pattern.field_name
                    && p.selector == pattern.selector
            });

            match existing {
                Some(current) => {
                    current.pattern_type = pattern.pattern_type;
                    current.fallback_selectors.clone_from(&pattern.fallback_selectors);
                    current.extraction_method = pattern.extraction_method;
                    current.attribute_name.clone_from(&pattern.attribute_name);
                    current.validation_regex.clone_from(&pattern.validation_regex);
                    current.required = pattern.required;
                    current.transform.clone_from(&pattern.transform);
                    current.base_confidence = pattern.base_confidence;
                    current.confidence_score =
                        current.confidence_score.max(pattern.confidence_score);
                    current.is_active = true;
                    current.learned_at = pattern.learned_at;
                }
                None => stored.push(pattern.clone()),
            }
        }

        Ok(learned.len())
    }

    async fn record_validations(
        &self,
        events: &[PatternValidationEvent],
    ) -> Result<(), RepositoryError> {
        let mut stored = write(&self.patterns);
        let mut log = write(&self.events);

        for event in events {
            let Some(pattern) = stored.iter_mut().find(|p| p.id == event.pattern_id) else {
                continue;
            };
            pattern.apply_validation(event.success, event.observed_at);
            log.push(event.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl MatchRepository for MemoryStore {
    async fn save_for_review(&self, duplicate: &DuplicateMatch) -> Result<(), RepositoryError> {
        let key_a = duplicate.booth_a.booth_key();
        let key_b = duplicate.booth_b.booth_key();
        let mut reviews = write(&self.reviews);

        match reviews
            .iter_mut()
            .find(|m| m.booth_a.booth_key() == key_a && m.booth_b.booth_key() == key_b)
        {
            Some(existing) => *existing = duplicate.clone(),
            None => reviews.push(duplicate.clone()),
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn catalog_for_country(
        &self,
        country: Option<&str>,
    ) -> Result<Vec<CatalogEntry>, RepositoryError> {
        Ok(read(&self.booths)
            .iter()
            .filter(|e| e.record.canonical_country().as_deref() == country)
            .cloned()
            .collect())
    }

    async fn upsert_booths(
        &self,
        records: &[CandidateRecord],
    ) -> Result<(usize, usize), RepositoryError> {
        let mut booths = write(&self.booths);
        let mut inserted = 0usize;
        let mut updated = 0usize;

        for record in records {
            let key = record.booth_key();
            match booths.iter_mut().find(|e| e.record.booth_key() == key) {
                Some(existing) => {
                    existing.record = record.clone();
                    updated += 1;
                }
                None => {
                    booths.push(CatalogEntry {
                        id: Uuid::new_v4(),
                        record: record.clone(),
                    });
                    inserted += 1;
                }
            }
        }
        Ok((inserted, updated))
    }

    async fn update_booth(
        &self,
        id: Uuid,
        record: &CandidateRecord,
    ) -> Result<(), RepositoryError> {
        let mut booths = write(&self.booths);
        let key = record.booth_key();
        if booths
            .iter()
            .any(|e| e.id != id && e.record.booth_key() == key)
        {
            return Err(RepositoryError::Backend(format!(
                "booth key {key} already belongs to another booth"
            )));
        }

        let entry = booths
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("booth {id}")))?;
        entry.record = record.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boothdb_core::{
        ExtractionMode, PatternField, PatternLearningStatus, PatternType, SourceType,
    };
    use chrono::Utc;

    fn entry(name: &str, mode: ExtractionMode) -> SourceEntry {
        SourceEntry {
            name: name.to_string(),
            url: "https://example.com/booths".to_string(),
            source_type: SourceType::Directory,
            extraction_mode: mode,
            enabled: true,
            notes: None,
        }
    }

    fn booth(name: &str, address: &str, country: &str) -> CandidateRecord {
        CandidateRecord {
            name: name.to_string(),
            address: address.to_string(),
            country: Some(country.to_string()),
            source_name: "autophoto".to_string(),
            ..CandidateRecord::default()
        }
    }

    #[tokio::test]
    async fn upserting_a_source_keeps_learning_state() {
        let store = MemoryStore::new();
        let created = store
            .upsert_source(&entry("Photobooth.net", ExtractionMode::Hybrid))
            .await
            .unwrap();
        assert_eq!(created.pattern_learning_status, PatternLearningStatus::NotStarted);

        let update = SourceStatusUpdate {
            pattern_learning_status: PatternLearningStatus::Completed,
            extraction_mode: None,
            pattern_learned_at: Some(Utc::now()),
        };
        store.update_learning_status(created.id, &update).await.unwrap();

        let refreshed = store
            .upsert_source(&entry("Photobooth.net", ExtractionMode::Direct))
            .await
            .unwrap();
        assert_eq!(refreshed.id, created.id);
        assert_eq!(refreshed.extraction_mode, ExtractionMode::Direct);
        assert_eq!(refreshed.pattern_learning_status, PatternLearningStatus::Completed);
        assert_eq!(store.list_sources().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn status_update_for_unknown_source_is_not_found() {
        let store = MemoryStore::new();
        let update = SourceStatusUpdate {
            pattern_learning_status: PatternLearningStatus::Failed,
            extraction_mode: Some(ExtractionMode::Hybrid),
            pattern_learned_at: None,
        };
        let err = store
            .update_learning_status(Uuid::new_v4(), &update)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn relearning_a_pattern_refreshes_instead_of_duplicating() {
        let store = MemoryStore::new();
        let source_id = Uuid::new_v4();
        let mut first =
            LearnedPattern::new(source_id, PatternField::Name, PatternType::Css, "h3", 0.7);
        first.success_count = 4;
        store.upsert_patterns(&[first.clone()]).await.unwrap();

        let again = LearnedPattern::new(source_id, PatternField::Name, PatternType::Css, "h3", 0.5)
            .with_fallbacks(["h2"]);
        store.upsert_patterns(&[again]).await.unwrap();

        let stored = store.all_patterns(source_id);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, first.id);
        assert_eq!(stored[0].success_count, 4);
        assert!((stored[0].confidence_score - 0.7).abs() < 1e-9);
        assert_eq!(stored[0].fallback_selectors, vec!["h2".to_string()]);
    }

    #[tokio::test]
    async fn failing_validations_deactivate_a_pattern() {
        let store = MemoryStore::new();
        let source_id = Uuid::new_v4();
        let pattern =
            LearnedPattern::new(source_id, PatternField::Address, PatternType::Css, ".addr", 0.4);
        store.upsert_patterns(&[pattern.clone()]).await.unwrap();

        let events: Vec<PatternValidationEvent> = (0..4)
            .map(|_| PatternValidationEvent {
                pattern_id: pattern.id,
                source_id,
                field_name: PatternField::Address,
                success: false,
                extracted_value: None,
                selector_index: None,
                latency_micros: 12,
                observed_at: Utc::now(),
            })
            .collect();
        store.record_validations(&events).await.unwrap();

        assert!(store.active_patterns(source_id).await.unwrap().is_empty());
        let stored = &store.all_patterns(source_id)[0];
        assert_eq!(stored.failure_count, 4);
        assert!(stored.confidence_score < 0.3);
        assert_eq!(store.validation_events().len(), 4);
    }

    #[tokio::test]
    async fn booths_upsert_by_key_and_filter_by_canonical_country() {
        let store = MemoryStore::new();
        let (inserted, updated) = store
            .upsert_booths(&[
                booth("Photoworks", "2 Bedford Ave", "USA"),
                booth("Fotoautomat", "Kastanienallee 1", "Germany"),
            ])
            .await
            .unwrap();
        assert_eq!((inserted, updated), (2, 0));

        let mut again = booth("Photoworks", "2 Bedford Ave", "United States");
        again.hours = Some("24/7".to_string());
        let (inserted, updated) = store.upsert_booths(&[again]).await.unwrap();
        assert_eq!((inserted, updated), (0, 1));

        let us = store.catalog_for_country(Some("US")).await.unwrap();
        assert_eq!(us.len(), 1);
        assert_eq!(us[0].record.hours.as_deref(), Some("24/7"));
        assert!(store.catalog_for_country(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_booth_rejects_unknown_ids() {
        let store = MemoryStore::new();
        let err = store
            .update_booth(Uuid::new_v4(), &booth("Photoworks", "2 Bedford Ave", "USA"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }
}
