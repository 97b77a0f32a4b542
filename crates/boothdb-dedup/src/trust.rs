//! Source trust tiers used to pick the primary record of a duplicate pair.

use std::collections::HashMap;

use boothdb_core::{SourceConfig, SourceType};
use serde::Serialize;

/// Provenance ranking, lowest first so tiers compare with `>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    Community,
    Directory,
    Aggregator,
    /// Operators and manufacturers: authoritative for their own machines.
    Operator,
}

impl From<SourceType> for TrustTier {
    fn from(source_type: SourceType) -> Self {
        match source_type {
            SourceType::Operator => TrustTier::Operator,
            SourceType::Aggregator => TrustTier::Aggregator,
            SourceType::Directory => TrustTier::Directory,
            SourceType::Community | SourceType::SingleVenueBlog => TrustTier::Community,
        }
    }
}

/// Built-in tiers for well-known source slugs.
const KNOWN_SOURCES: &[(&str, TrustTier)] = &[
    ("autophoto", TrustTier::Operator),
    ("photomatica", TrustTier::Operator),
    ("classic-photo-booth", TrustTier::Operator),
    ("photobooth-supply-co", TrustTier::Operator),
    ("fotoautomat-berlin", TrustTier::Operator),
    ("fotoautomatica", TrustTier::Operator),
    ("lomography", TrustTier::Aggregator),
    ("atlas-obscura", TrustTier::Aggregator),
    ("photobooth-net", TrustTier::Directory),
    ("photoautomat-map", TrustTier::Directory),
    ("analog-booth-finder", TrustTier::Directory),
    ("reddit-analog", TrustTier::Community),
    ("flickr-photobooth", TrustTier::Community),
];

/// Static trust table, optionally extended with tiers derived from the
/// source registry. Unknown sources rank lowest.
#[derive(Debug, Clone, Default)]
pub struct TrustTable {
    registry: HashMap<String, TrustTier>,
}

impl TrustTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry entries take precedence over the built-in table.
    #[must_use]
    pub fn with_sources(sources: &[SourceConfig]) -> Self {
        Self {
            registry: sources
                .iter()
                .map(|s| (s.slug.clone(), TrustTier::from(s.source_type)))
                .collect(),
        }
    }

    #[must_use]
    pub fn tier(&self, source_name: &str) -> TrustTier {
        let key = source_name.trim().to_lowercase();
        if let Some(tier) = self.registry.get(&key) {
            return *tier;
        }
        KNOWN_SOURCES
            .iter()
            .find(|(slug, _)| *slug == key)
            .map_or(TrustTier::Community, |(_, tier)| *tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boothdb_core::{ExtractionMode, PatternLearningStatus};
    use uuid::Uuid;

    #[test]
    fn tiers_order_operator_highest() {
        assert!(TrustTier::Operator > TrustTier::Aggregator);
        assert!(TrustTier::Aggregator > TrustTier::Directory);
        assert!(TrustTier::Directory > TrustTier::Community);
    }

    #[test]
    fn unknown_sources_rank_lowest() {
        let table = TrustTable::new();
        assert_eq!(table.tier("some-random-blog"), TrustTier::Community);
        assert_eq!(table.tier(""), TrustTier::Community);
    }

    #[test]
    fn known_slugs_resolve_case_insensitively() {
        let table = TrustTable::new();
        assert_eq!(table.tier("AutoPhoto"), TrustTier::Operator);
        assert_eq!(table.tier("photobooth-net"), TrustTier::Directory);
    }

    #[test]
    fn registry_overrides_builtin() {
        let source = SourceConfig {
            id: Uuid::new_v4(),
            name: "Photobooth.net".to_string(),
            slug: "photobooth-net".to_string(),
            url: "https://photobooth.net/locations/".to_string(),
            source_type: SourceType::Aggregator,
            extraction_mode: ExtractionMode::Hybrid,
            pattern_learning_status: PatternLearningStatus::NotStarted,
            pattern_learned_at: None,
            enabled: true,
        };
        let table = TrustTable::with_sources(&[source]);
        assert_eq!(table.tier("photobooth-net"), TrustTier::Aggregator);
        assert_eq!(table.tier("autophoto"), TrustTier::Operator);
    }
}
