use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ConfigError;

/// Provenance class of a source. Drives trust ranking and the Direct
/// scraper's expected-count heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Booth operators and manufacturers.
    Operator,
    Aggregator,
    Directory,
    Community,
    /// A blog post describing one venue.
    SingleVenueBlog,
}

impl SourceType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Operator => "operator",
            SourceType::Aggregator => "aggregator",
            SourceType::Directory => "directory",
            SourceType::Community => "community",
            SourceType::SingleVenueBlog => "single_venue_blog",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "operator" => Ok(SourceType::Operator),
            "aggregator" => Ok(SourceType::Aggregator),
            "directory" => Ok(SourceType::Directory),
            "community" => Ok(SourceType::Community),
            "single_venue_blog" => Ok(SourceType::SingleVenueBlog),
            other => Err(format!("unknown source type '{other}'")),
        }
    }
}

/// Configured extraction mode for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    Agent,
    Direct,
    #[default]
    Hybrid,
}

impl ExtractionMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionMode::Agent => "agent",
            ExtractionMode::Direct => "direct",
            ExtractionMode::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExtractionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent" => Ok(ExtractionMode::Agent),
            "direct" => Ok(ExtractionMode::Direct),
            "hybrid" => Ok(ExtractionMode::Hybrid),
            other => Err(format!("unknown extraction mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternLearningStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Failed,
}

impl PatternLearningStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PatternLearningStatus::NotStarted => "not_started",
            PatternLearningStatus::InProgress => "in_progress",
            PatternLearningStatus::Completed => "completed",
            PatternLearningStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PatternLearningStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PatternLearningStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(PatternLearningStatus::NotStarted),
            "in_progress" => Ok(PatternLearningStatus::InProgress),
            "completed" => Ok(PatternLearningStatus::Completed),
            "failed" => Ok(PatternLearningStatus::Failed),
            other => Err(format!("unknown pattern learning status '{other}'")),
        }
    }
}

/// A persisted source, as the pipeline sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub url: String,
    pub source_type: SourceType,
    pub extraction_mode: ExtractionMode,
    pub pattern_learning_status: PatternLearningStatus,
    pub pattern_learned_at: Option<DateTime<Utc>>,
    pub enabled: bool,
}

impl SourceConfig {
    /// A never-crawled source built from a registry entry.
    #[must_use]
    pub fn from_entry(entry: &SourceEntry) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: entry.name.clone(),
            slug: entry.slug(),
            url: entry.url.clone(),
            source_type: entry.source_type,
            extraction_mode: entry.extraction_mode,
            pattern_learning_status: PatternLearningStatus::NotStarted,
            pattern_learned_at: None,
            enabled: entry.enabled,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// One entry of the YAML source registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    pub name: String,
    pub url: String,
    pub source_type: SourceType,
    #[serde(default)]
    pub extraction_mode: ExtractionMode,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub notes: Option<String>,
}

impl SourceEntry {
    /// Generate a URL-safe slug from the source name.
    #[must_use]
    pub fn slug(&self) -> String {
        self.name
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' {
                    c
                } else if c == ' ' || c == '_' || c == '.' {
                    '-'
                } else {
                    '\0'
                }
            })
            .filter(|&c| c != '\0')
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    }
}

#[derive(Debug, Deserialize)]
pub struct SourcesFile {
    pub sources: Vec<SourceEntry>,
}

/// Load and validate the source registry from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sources(path: &Path) -> Result<SourcesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SourcesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_sources(&content)
}

/// Parse and validate registry YAML.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_sources(content: &str) -> Result<SourcesFile, ConfigError> {
    let sources_file: SourcesFile = serde_yaml::from_str(content)?;
    validate_sources(&sources_file)?;
    Ok(sources_file)
}

fn validate_sources(sources_file: &SourcesFile) -> Result<(), ConfigError> {
    let mut seen_slugs = HashSet::new();

    for source in &sources_file.sources {
        if source.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source name must be non-empty".to_string(),
            ));
        }

        if !(source.url.starts_with("http://") || source.url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "source '{}' has non-http url '{}'",
                source.name, source.url
            )));
        }

        let slug = source.slug();
        if slug.is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' produces an empty slug",
                source.name
            )));
        }
        if !seen_slugs.insert(slug.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source slug: '{}' (from source '{}')",
                slug, source.name
            )));
        }
    }

    Ok(())
}
