//! Duplicate detection and merging for candidate booth records.

pub mod batch;
pub mod compare;
pub mod conflicts;
pub mod merge;
pub mod trust;

pub use batch::{CatalogOutcome, DedupEngine, DedupOutcome};
pub use compare::{compare_booths, score_pair, ComparisonScores};
pub use conflicts::detect_conflicts;
pub use merge::{merge_booths, merge_match};
pub use trust::{TrustTable, TrustTier};
