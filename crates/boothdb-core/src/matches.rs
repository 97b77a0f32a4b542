//! Outcome of comparing two candidate records.

use serde::{Deserialize, Serialize};

use crate::records::CandidateRecord;

/// Composite-confidence band of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    HighConfidence,
    Probable,
    ManualReview,
}

impl MatchType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::HighConfidence => "high_confidence",
            MatchType::Probable => "probable",
            MatchType::ManualReview => "manual_review",
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Merge,
    KeepBoth,
    ManualReview,
}

impl RecommendedAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendedAction::Merge => "merge",
            RecommendedAction::KeepBoth => "keep_both",
            RecommendedAction::ManualReview => "manual_review",
        }
    }
}

impl std::fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Keep the primary's values, fill only its gaps from the duplicate.
    KeepPrimary,
    /// Field-by-field union, used when both sides are equally trusted.
    MergeFields,
}

impl MergeStrategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MergeStrategy::KeepPrimary => "keep_primary",
            MergeStrategy::MergeFields => "merge_fields",
        }
    }
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSide {
    A,
    B,
}

/// Two near-duplicates disagree on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConflict {
    pub field: String,
    pub value_a: String,
    pub value_b: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub booth_a: CandidateRecord,
    pub booth_b: CandidateRecord,
    /// Composite confidence, 0-100.
    pub confidence_score: f64,
    pub match_type: MatchType,
    pub name_similarity: f64,
    pub address_similarity: Option<f64>,
    pub location_similarity: Option<f64>,
    pub distance_meters: Option<f64>,
    pub recommended_action: RecommendedAction,
    pub merge_strategy: MergeStrategy,
    pub primary_booth: MatchSide,
    pub conflicts: Vec<FieldConflict>,
}

impl DuplicateMatch {
    #[must_use]
    pub fn primary(&self) -> &CandidateRecord {
        match self.primary_booth {
            MatchSide::A => &self.booth_a,
            MatchSide::B => &self.booth_b,
        }
    }

    #[must_use]
    pub fn duplicate(&self) -> &CandidateRecord {
        match self.primary_booth {
            MatchSide::A => &self.booth_b,
            MatchSide::B => &self.booth_a,
        }
    }

    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}
