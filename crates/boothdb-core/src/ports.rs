//! Collaborator ports.
//!
//! The pipeline never talks to a database, an HTTP client, or an AI backend
//! directly. Each dependency is an injected trait object with a typed
//! signature:
//! - `SourceRepository`, `PatternRepository`, `MatchRepository`,
//!   `CatalogRepository`: persistence
//! - `PageFetcher`: raw page retrieval
//! - `AgentExtractor`: the AI extraction backend
//! - `GeocodeLookup`: address resolution (implemented by the cascade)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geocode::{GeocodeQuery, GeocodeResult};
use crate::matches::DuplicateMatch;
use crate::patterns::{LearnedPattern, PatternValidationEvent};
use crate::records::CandidateRecord;
use crate::sources::{ExtractionMode, PatternLearningStatus, SourceConfig, SourceEntry};
use crate::{AgentError, FetchError, RepositoryError};

/// Fields written back to a source when pattern learning changes state.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceStatusUpdate {
    pub pattern_learning_status: PatternLearningStatus,
    /// `None` leaves the configured mode unchanged.
    pub extraction_mode: Option<ExtractionMode>,
    pub pattern_learned_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait SourceRepository: Send + Sync {
    async fn list_sources(&self) -> Result<Vec<SourceConfig>, RepositoryError>;

    async fn get_source_by_slug(&self, slug: &str)
        -> Result<Option<SourceConfig>, RepositoryError>;

    /// Insert or refresh a registry entry. Learning state of an existing
    /// source is preserved.
    async fn upsert_source(&self, entry: &SourceEntry) -> Result<SourceConfig, RepositoryError>;

    async fn update_learning_status(
        &self,
        source_id: Uuid,
        update: &SourceStatusUpdate,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PatternRepository: Send + Sync {
    /// Active patterns for a source, in no particular order.
    async fn active_patterns(&self, source_id: Uuid)
        -> Result<Vec<LearnedPattern>, RepositoryError>;

    /// Upsert keyed by `(source_id, field_name, selector)`. An existing rule
    /// is refreshed, never duplicated. Returns the number of rows written.
    async fn upsert_patterns(&self, patterns: &[LearnedPattern]) -> Result<usize, RepositoryError>;

    /// Append validation events and revise each pattern's confidence.
    async fn record_validations(
        &self,
        events: &[PatternValidationEvent],
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait MatchRepository: Send + Sync {
    /// Queue a match for human review.
    async fn save_for_review(&self, duplicate: &DuplicateMatch) -> Result<(), RepositoryError>;
}

/// A persisted catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: Uuid,
    pub record: CandidateRecord,
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Catalog records whose canonical country equals `country`; `None`
    /// selects records without a country.
    async fn catalog_for_country(
        &self,
        country: Option<&str>,
    ) -> Result<Vec<CatalogEntry>, RepositoryError>;

    /// Upsert by booth key. Returns `(inserted, updated)`.
    async fn upsert_booths(
        &self,
        records: &[CandidateRecord],
    ) -> Result<(usize, usize), RepositoryError>;

    async fn update_booth(&self, id: Uuid, record: &CandidateRecord)
        -> Result<(), RepositoryError>;
}

/// Raw page content for one URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub url: String,
    pub html: String,
    /// Simplified text rendering, when the fetcher provides one.
    pub markdown: Option<String>,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PageContent, FetchError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentDiagnostics {
    pub model: Option<String>,
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentExtraction {
    pub records: Vec<CandidateRecord>,
    #[serde(default)]
    pub diagnostics: AgentDiagnostics,
}

/// The AI extraction backend. Opaque to the pipeline.
#[async_trait]
pub trait AgentExtractor: Send + Sync {
    async fn extract(
        &self,
        page: &PageContent,
        source: &SourceConfig,
    ) -> Result<AgentExtraction, AgentError>;
}

/// Address-to-coordinate resolution. `None` means "could not geocode".
#[async_trait]
pub trait GeocodeLookup: Send + Sync {
    async fn geocode(&self, query: &GeocodeQuery) -> Option<GeocodeResult>;
}
