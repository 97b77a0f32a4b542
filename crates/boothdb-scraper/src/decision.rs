//! Extraction-mode decision and execution.
//!
//! [`decide_mode`] is a pure decision table over the source's configuration
//! and its stored patterns. [`ExtractionEngine`] executes the decision,
//! falls back from Direct to the agent when a hybrid run underperforms,
//! and runs the learner as a second stage after agent extractions.

use std::sync::Arc;

use boothdb_core::{
    AgentDiagnostics, AgentExtractor, CandidateRecord, ExtractionMode, LearnedPattern,
    PageContent, PatternField, PatternLearningStatus, PatternRepository, SourceConfig,
    SourceRepository, SourceStatusUpdate, SourceType,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::direct::{scrape_direct, DirectScrapeOutcome};
use crate::learner::{learn_and_store, LearningOutcome};

/// Average pattern confidence below which Direct is not trusted.
pub const MIN_AVERAGE_CONFIDENCE: f64 = 0.5;
/// Patterns older than this are refreshed through the agent.
pub const MAX_PATTERN_AGE_DAYS: i64 = 90;
/// A Direct run scoring below this falls back to the agent.
pub const FALLBACK_CONFIDENCE: f64 = 0.4;
/// Non-blog sources yielding fewer records than this fall back.
pub const MIN_DIRECT_RECORDS: usize = 2;

/// Why the agent was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum AgentReason {
    ConfiguredAgent,
    /// Direct or hybrid source without stored patterns; seeds them.
    NoPatterns,
    LearningNotStarted,
    LowConfidence { average: f64 },
    StalePatterns { age_days: i64 },
    MissingRequiredField { field: PatternField },
}

impl std::fmt::Display for AgentReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentReason::ConfiguredAgent => write!(f, "source is configured for agent mode"),
            AgentReason::NoPatterns => write!(f, "no stored patterns"),
            AgentReason::LearningNotStarted => write!(f, "pattern learning not started"),
            AgentReason::LowConfidence { average } => {
                write!(f, "average pattern confidence {average:.2} is too low")
            }
            AgentReason::StalePatterns { age_days } => {
                write!(f, "oldest pattern is {age_days} days old")
            }
            AgentReason::MissingRequiredField { field } => {
                write!(f, "no pattern for required field {field}")
            }
        }
    }
}

/// The chosen way to extract one page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ModeDecision {
    Agent { reason: AgentReason },
    /// Direct only; an underperforming run is reported, not retried.
    Direct,
    /// Direct first, agent on underperformance.
    HybridWithFallback,
}

impl ModeDecision {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ModeDecision::Agent { .. } => "agent",
            ModeDecision::Direct => "direct",
            ModeDecision::HybridWithFallback => "hybrid",
        }
    }
}

/// Pick an extraction mode. First matching rule wins:
///
/// 1. configured `agent`
/// 2. learning not started, whatever the configured mode
/// 3. `direct` without patterns (seed once through the agent)
/// 4. `hybrid`: no patterns, low average confidence, stale patterns, or a
///    missing `name`/`address` pattern each force the agent
/// 5. otherwise the configured mode
#[must_use]
pub fn decide_mode(
    source: &SourceConfig,
    patterns: &[LearnedPattern],
    now: DateTime<Utc>,
) -> ModeDecision {
    let agent = |reason| ModeDecision::Agent { reason };

    match source.extraction_mode {
        ExtractionMode::Agent => agent(AgentReason::ConfiguredAgent),
        _ if source.pattern_learning_status == PatternLearningStatus::NotStarted => {
            agent(AgentReason::LearningNotStarted)
        }
        ExtractionMode::Direct if patterns.is_empty() => agent(AgentReason::NoPatterns),
        ExtractionMode::Direct => ModeDecision::Direct,
        ExtractionMode::Hybrid => {
            if patterns.is_empty() {
                return agent(AgentReason::NoPatterns);
            }
            let average = average_confidence(patterns);
            if average < MIN_AVERAGE_CONFIDENCE {
                return agent(AgentReason::LowConfidence { average });
            }
            if let Some(age_days) = oldest_age_days(patterns, now) {
                if age_days > MAX_PATTERN_AGE_DAYS {
                    return agent(AgentReason::StalePatterns { age_days });
                }
            }
            for field in [PatternField::Name, PatternField::Address] {
                if !patterns.iter().any(|p| p.field_name == field) {
                    return agent(AgentReason::MissingRequiredField { field });
                }
            }
            ModeDecision::HybridWithFallback
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn average_confidence(patterns: &[LearnedPattern]) -> f64 {
    if patterns.is_empty() {
        return 0.0;
    }
    patterns.iter().map(|p| p.confidence_score).sum::<f64>() / patterns.len() as f64
}

fn oldest_age_days(patterns: &[LearnedPattern], now: DateTime<Utc>) -> Option<i64> {
    patterns
        .iter()
        .map(|p| p.learned_at)
        .min()
        .map(|oldest| (now - oldest).num_days())
}

/// Why a Direct run was judged to underperform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum FallbackReason {
    NoRecords,
    LowConfidence { confidence: f64 },
    TooFewRecords { found: usize },
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::NoRecords => write!(f, "direct extraction found no records"),
            FallbackReason::LowConfidence { confidence } => {
                write!(f, "direct confidence {confidence:.2} below {FALLBACK_CONFIDENCE}")
            }
            FallbackReason::TooFewRecords { found } => {
                write!(f, "direct extraction found only {found} record(s)")
            }
        }
    }
}

/// `None` when the Direct run is good enough to keep.
#[must_use]
pub fn fallback_reason(
    outcome: &DirectScrapeOutcome,
    source_type: SourceType,
) -> Option<FallbackReason> {
    let found = outcome.records.len();
    if found == 0 {
        Some(FallbackReason::NoRecords)
    } else if outcome.confidence < FALLBACK_CONFIDENCE {
        Some(FallbackReason::LowConfidence {
            confidence: outcome.confidence,
        })
    } else if found < MIN_DIRECT_RECORDS && source_type != SourceType::SingleVenueBlog {
        Some(FallbackReason::TooFewRecords { found })
    } else {
        None
    }
}

/// Which extractor produced the final records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorUsed {
    Agent,
    Direct,
}

impl ExtractorUsed {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractorUsed::Agent => "agent",
            ExtractorUsed::Direct => "direct",
        }
    }
}

/// Everything that happened while extracting one page.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub source: String,
    pub decision: ModeDecision,
    /// `None` when every attempted extractor failed.
    pub extractor: Option<ExtractorUsed>,
    pub records: Vec<CandidateRecord>,
    pub fallback: Option<FallbackReason>,
    pub direct: Option<DirectScrapeOutcome>,
    pub agent_diagnostics: Option<AgentDiagnostics>,
    pub learning: Option<LearningOutcome>,
    pub errors: Vec<String>,
}

impl ExtractionReport {
    fn new(source: &SourceConfig, decision: ModeDecision) -> Self {
        Self {
            source: source.slug.clone(),
            decision,
            extractor: None,
            records: Vec::new(),
            fallback: None,
            direct: None,
            agent_diagnostics: None,
            learning: None,
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn fell_back(&self) -> bool {
        self.fallback.is_some()
    }

    /// True when the agent ran because the stored patterns were missing,
    /// stale, or untrusted, or because Direct underperformed. The learner
    /// then runs again even for a source that already completed learning.
    #[must_use]
    pub fn refreshes_patterns(&self) -> bool {
        match self.decision {
            ModeDecision::Agent { reason } => reason != AgentReason::ConfiguredAgent,
            ModeDecision::Direct | ModeDecision::HybridWithFallback => self.fell_back(),
        }
    }
}

/// Runs the decided extraction mode for one source page.
pub struct ExtractionEngine {
    agent: Arc<dyn AgentExtractor>,
    sources: Arc<dyn SourceRepository>,
    patterns: Arc<dyn PatternRepository>,
}

impl ExtractionEngine {
    #[must_use]
    pub fn new(
        agent: Arc<dyn AgentExtractor>,
        sources: Arc<dyn SourceRepository>,
        patterns: Arc<dyn PatternRepository>,
    ) -> Self {
        Self {
            agent,
            sources,
            patterns,
        }
    }

    /// Extract candidate records from one page of `source`.
    ///
    /// Never fails: extractor, learner, and persistence errors are logged
    /// and collected in [`ExtractionReport::errors`].
    pub async fn extract(&self, source: &SourceConfig, page: &PageContent) -> ExtractionReport {
        let patterns = match self.patterns.active_patterns(source.id).await {
            Ok(patterns) => patterns,
            Err(e) => {
                tracing::warn!(source = %source.slug, error = %e, "failed to load patterns");
                Vec::new()
            }
        };

        let decision = decide_mode(source, &patterns, Utc::now());
        let mut report = ExtractionReport::new(source, decision);
        match decision {
            ModeDecision::Agent { reason } => {
                tracing::info!(source = %source.slug, mode = "agent", %reason, "extraction mode decided");
            }
            other => {
                tracing::info!(
                    source = %source.slug,
                    mode = other.as_str(),
                    patterns = patterns.len(),
                    "extraction mode decided"
                );
            }
        }

        match decision {
            ModeDecision::Agent { .. } => {
                self.run_agent(source, page, &mut report).await;
            }
            ModeDecision::Direct => {
                let outcome = self.run_direct(source, page, &patterns).await;
                if let Some(reason) = fallback_reason(&outcome, source.source_type) {
                    report.errors.push(reason.to_string());
                }
                report.records.clone_from(&outcome.records);
                report.extractor = Some(ExtractorUsed::Direct);
                report.direct = Some(outcome);
            }
            ModeDecision::HybridWithFallback => {
                let outcome = self.run_direct(source, page, &patterns).await;
                match fallback_reason(&outcome, source.source_type) {
                    None => {
                        report.records.clone_from(&outcome.records);
                        report.extractor = Some(ExtractorUsed::Direct);
                    }
                    Some(reason) => {
                        tracing::info!(
                            source = %source.slug,
                            %reason,
                            confidence = outcome.confidence,
                            records = outcome.records.len(),
                            "direct extraction underperformed, falling back to agent"
                        );
                        report.fallback = Some(reason);
                        self.run_agent(source, page, &mut report).await;
                        if report.extractor.is_none() && !outcome.records.is_empty() {
                            tracing::warn!(
                                source = %source.slug,
                                records = outcome.records.len(),
                                "agent unavailable after fallback, keeping direct records"
                            );
                            report.records.clone_from(&outcome.records);
                            report.extractor = Some(ExtractorUsed::Direct);
                        }
                    }
                }
                report.direct = Some(outcome);
            }
        }

        if report.extractor == Some(ExtractorUsed::Agent)
            && !report.records.is_empty()
            && (source.pattern_learning_status != PatternLearningStatus::Completed
                || report.refreshes_patterns())
        {
            self.learn(source, page, &mut report).await;
        }

        tracing::info!(
            source = %source.slug,
            extractor = ?report.extractor,
            records = report.records.len(),
            errors = report.errors.len(),
            "extraction finished"
        );
        report
    }

    async fn run_agent(&self, source: &SourceConfig, page: &PageContent, report: &mut ExtractionReport) {
        match self.agent.extract(page, source).await {
            Ok(extraction) => {
                let total = extraction.records.len();
                report.records = extraction
                    .records
                    .into_iter()
                    .filter_map(|mut record| {
                        if record.source_name.is_empty() {
                            record.source_name.clone_from(&source.slug);
                        }
                        if record.source_url.is_empty() {
                            record.source_url.clone_from(&page.url);
                        }
                        record.sanitized()
                    })
                    .collect();
                if report.records.is_empty() {
                    report
                        .errors
                        .push("agent extraction returned no valid records".to_string());
                }
                tracing::debug!(
                    source = %source.slug,
                    returned = total,
                    valid = report.records.len(),
                    "agent extraction finished"
                );
                report.agent_diagnostics = Some(extraction.diagnostics);
                report.extractor = Some(ExtractorUsed::Agent);
            }
            Err(e) => {
                tracing::warn!(source = %source.slug, error = %e, "agent extraction failed");
                report.errors.push(format!("agent extraction failed: {e}"));
            }
        }
    }

    async fn run_direct(
        &self,
        source: &SourceConfig,
        page: &PageContent,
        patterns: &[LearnedPattern],
    ) -> DirectScrapeOutcome {
        let outcome = scrape_direct(page, source, patterns);
        if let Err(e) = self
            .patterns
            .record_validations(&outcome.validation_events)
            .await
        {
            tracing::warn!(source = %source.slug, error = %e, "failed to record pattern validations");
        }
        outcome
    }

    async fn learn(&self, source: &SourceConfig, page: &PageContent, report: &mut ExtractionReport) {
        let learning = match learn_and_store(self.patterns.as_ref(), page, source, &report.records).await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(source = %source.slug, error = %e, "pattern learning failed");
                report.errors.push(format!("pattern learning failed: {e}"));
                return;
            }
        };

        // A failed refresh keeps the earlier patterns and status.
        if !learning.success && source.pattern_learning_status == PatternLearningStatus::Completed {
            tracing::warn!(
                source = %source.slug,
                "pattern refresh found nothing, keeping existing patterns"
            );
            report.learning = Some(learning);
            return;
        }

        let update = if learning.success {
            SourceStatusUpdate {
                pattern_learning_status: PatternLearningStatus::Completed,
                extraction_mode: None,
                pattern_learned_at: Some(Utc::now()),
            }
        } else {
            SourceStatusUpdate {
                pattern_learning_status: PatternLearningStatus::Failed,
                // A Direct source that cannot learn needs agent fallback.
                extraction_mode: (source.extraction_mode == ExtractionMode::Direct)
                    .then_some(ExtractionMode::Hybrid),
                pattern_learned_at: None,
            }
        };
        if let Err(e) = self.sources.update_learning_status(source.id, &update).await {
            tracing::warn!(source = %source.slug, error = %e, "failed to update source learning status");
            report
                .errors
                .push(format!("failed to update source learning status: {e}"));
        } else {
            tracing::info!(
                source = %source.slug,
                status = %update.pattern_learning_status,
                patterns = learning.patterns.len(),
                "source learning status updated"
            );
        }
        report.learning = Some(learning);
    }
}

#[cfg(test)]
#[path = "decision_test.rs"]
mod tests;
