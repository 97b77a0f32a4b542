//! Shared domain types, primitives, and collaborator ports for the booth
//! extraction and entity-resolution pipeline.

pub mod app_config;
pub mod config;
pub mod geo;
pub mod geocode;
pub mod matches;
pub mod patterns;
pub mod ports;
pub mod records;
pub mod similarity;
pub mod sources;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use geo::{haversine_meters, Coordinates};
pub use geocode::{GeocodeConfidence, GeocodeProviderKind, GeocodeQuery, GeocodeResult};
pub use matches::{
    DuplicateMatch, FieldConflict, MatchSide, MatchType, MergeStrategy, RecommendedAction,
};
pub use patterns::{
    ExtractionMethod, LearnedPattern, PatternField, PatternType, PatternValidationEvent,
    DIRECT_CONFIDENCE_FLOOR,
};
pub use ports::{
    AgentDiagnostics, AgentExtraction, AgentExtractor, CatalogEntry, CatalogRepository,
    GeocodeLookup, MatchRepository, PageContent, PageFetcher, PatternRepository,
    SourceRepository, SourceStatusUpdate,
};
pub use records::{BoothStatus, CandidateRecord};
pub use similarity::{edit_distance, normalize_text, similarity};
pub use sources::{
    load_sources, ExtractionMode, PatternLearningStatus, SourceConfig, SourceEntry, SourceType,
    SourcesFile,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read sources file {path}: {source}")]
    SourcesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sources file: {0}")]
    SourcesFileParse(#[from] serde_yaml::Error),

    #[error("sources validation failed: {0}")]
    Validation(String),
}

/// Errors surfaced by persistence ports. Backends map their native errors
/// into [`RepositoryError::Backend`] so callers never depend on a driver.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("stored value could not be decoded for {context}: {reason}")]
    Decode { context: String, reason: String },
}

/// Errors from the AI extraction collaborator.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent extractor is not configured")]
    Unavailable,

    #[error("agent request failed for {url}: {reason}")]
    Request { url: String, reason: String },

    #[error("agent response could not be decoded for {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// Errors from the page-fetching collaborator.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error fetching {url}: {reason}")]
    Http { url: String, reason: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("page {url} returned an empty body")]
    EmptyBody { url: String },
}
