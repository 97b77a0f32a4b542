//! Page analysis, pattern learning, pattern-based extraction, and the
//! extraction-mode decision engine.

pub mod analysis;
pub mod decision;
pub mod direct;
pub mod error;
pub mod learner;
pub mod transforms;

pub use analysis::{analyze_structure, find_containers, PageStructure};
pub use decision::{
    decide_mode, fallback_reason, AgentReason, ExtractionEngine, ExtractionReport,
    ExtractorUsed, FallbackReason, ModeDecision,
};
pub use direct::{scrape_direct, DirectScrapeOutcome, PatternStats};
pub use error::ScraperError;
pub use learner::{learn_and_store, learn_patterns, LearningOutcome};
pub use transforms::apply_transform;
