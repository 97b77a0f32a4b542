use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use boothdb_core::{
    AgentError, AgentExtraction, PatternType, SourceConfig, SourceType,
};
use boothdb_db::MemoryStore;
use chrono::Duration;
use uuid::Uuid;

use super::*;

const BOOTHS: &[(&str, &str)] = &[
    ("Musée Mécanique", "Pier 45"),
    ("Photoworks", "2 Bedford Ave"),
    ("Ace Hotel", "20 W 29th St"),
    ("Holga Bar", "77 Kent Ave"),
    ("Lodge Bar", "318 Grand St"),
];

fn listing_html() -> String {
    let items: String = BOOTHS
        .iter()
        .map(|(name, address)| {
            format!(r#"<li class="booth"><h3>{name}</h3><span class="address">{address}</span></li>"#)
        })
        .collect();
    format!("<html><body><ul>{items}</ul></body></html>")
}

fn page(html: &str) -> PageContent {
    PageContent {
        url: "https://autophoto.org/locations".to_string(),
        html: html.to_string(),
        markdown: None,
    }
}

fn source(mode: ExtractionMode, status: PatternLearningStatus) -> SourceConfig {
    SourceConfig {
        id: Uuid::new_v4(),
        name: "Autophoto".to_string(),
        slug: "autophoto".to_string(),
        url: "https://autophoto.org/locations".to_string(),
        source_type: SourceType::Aggregator,
        extraction_mode: mode,
        pattern_learning_status: status,
        pattern_learned_at: None,
        enabled: true,
    }
}

fn agent_records() -> Vec<CandidateRecord> {
    BOOTHS
        .iter()
        .map(|(name, address)| CandidateRecord {
            name: (*name).to_string(),
            address: (*address).to_string(),
            ..CandidateRecord::default()
        })
        .collect()
}

fn pattern(source: &SourceConfig, field: PatternField, selector: &str, confidence: f64) -> LearnedPattern {
    LearnedPattern::new(source.id, field, PatternType::Css, selector, confidence)
}

/// Scripted agent that counts calls.
struct FakeAgent {
    records: Option<Vec<CandidateRecord>>,
    calls: AtomicUsize,
}

impl FakeAgent {
    fn returning(records: Vec<CandidateRecord>) -> Arc<Self> {
        Arc::new(Self {
            records: Some(records),
            calls: AtomicUsize::new(0),
        })
    }

    fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            records: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentExtractor for FakeAgent {
    async fn extract(
        &self,
        _page: &PageContent,
        _source: &SourceConfig,
    ) -> Result<AgentExtraction, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.records {
            Some(records) => Ok(AgentExtraction {
                records: records.clone(),
                diagnostics: AgentDiagnostics {
                    model: Some("scripted".to_string()),
                    ..AgentDiagnostics::default()
                },
            }),
            None => Err(AgentError::Unavailable),
        }
    }
}

fn engine(agent: Arc<FakeAgent>, store: &Arc<MemoryStore>) -> ExtractionEngine {
    ExtractionEngine::new(agent, store.clone(), store.clone())
}

// ---------------------------------------------------------------------------
// decide_mode
// ---------------------------------------------------------------------------

#[test]
fn not_started_always_uses_agent() {
    for mode in [ExtractionMode::Agent, ExtractionMode::Direct, ExtractionMode::Hybrid] {
        let source = source(mode, PatternLearningStatus::NotStarted);
        let patterns = vec![
            pattern(&source, PatternField::Name, "h3", 0.9),
            pattern(&source, PatternField::Address, ".address", 0.9),
        ];
        assert!(
            matches!(decide_mode(&source, &patterns, Utc::now()), ModeDecision::Agent { .. }),
            "{mode}"
        );
    }
}

#[test]
fn configured_agent_wins() {
    let source = source(ExtractionMode::Agent, PatternLearningStatus::Completed);
    assert_eq!(
        decide_mode(&source, &[], Utc::now()),
        ModeDecision::Agent {
            reason: AgentReason::ConfiguredAgent
        }
    );
}

#[test]
fn direct_without_patterns_seeds_through_agent() {
    let source = source(ExtractionMode::Direct, PatternLearningStatus::Completed);
    assert_eq!(
        decide_mode(&source, &[], Utc::now()),
        ModeDecision::Agent {
            reason: AgentReason::NoPatterns
        }
    );
    let patterns = vec![pattern(&source, PatternField::Name, "h3", 0.35)];
    assert_eq!(decide_mode(&source, &patterns, Utc::now()), ModeDecision::Direct);
}

#[test]
fn hybrid_rules_in_order() {
    let source = source(ExtractionMode::Hybrid, PatternLearningStatus::Completed);
    let now = Utc::now();

    assert_eq!(
        decide_mode(&source, &[], now),
        ModeDecision::Agent {
            reason: AgentReason::NoPatterns
        }
    );

    let weak = vec![
        pattern(&source, PatternField::Name, "h3", 0.4),
        pattern(&source, PatternField::Address, ".address", 0.5),
    ];
    assert!(matches!(
        decide_mode(&source, &weak, now),
        ModeDecision::Agent {
            reason: AgentReason::LowConfidence { .. }
        }
    ));

    let mut stale = vec![
        pattern(&source, PatternField::Name, "h3", 0.7),
        pattern(&source, PatternField::Address, ".address", 0.7),
    ];
    stale[1].learned_at = now - Duration::days(91);
    assert_eq!(
        decide_mode(&source, &stale, now),
        ModeDecision::Agent {
            reason: AgentReason::StalePatterns { age_days: 91 }
        }
    );

    let no_address = vec![
        pattern(&source, PatternField::Name, "h3", 0.7),
        pattern(&source, PatternField::City, ".city", 0.7),
    ];
    assert_eq!(
        decide_mode(&source, &no_address, now),
        ModeDecision::Agent {
            reason: AgentReason::MissingRequiredField {
                field: PatternField::Address
            }
        }
    );

    let good = vec![
        pattern(&source, PatternField::Name, "h3", 0.7),
        pattern(&source, PatternField::Address, ".address", 0.6),
    ];
    assert_eq!(decide_mode(&source, &good, now), ModeDecision::HybridWithFallback);
}

#[test]
fn ninety_day_old_patterns_are_still_fresh() {
    let source = source(ExtractionMode::Hybrid, PatternLearningStatus::Completed);
    let now = Utc::now();
    let mut patterns = vec![
        pattern(&source, PatternField::Name, "h3", 0.7),
        pattern(&source, PatternField::Address, ".address", 0.7),
    ];
    patterns[0].learned_at = now - Duration::days(90);
    assert_eq!(decide_mode(&source, &patterns, now), ModeDecision::HybridWithFallback);
}

#[test]
fn fallback_triggers() {
    let mut outcome = DirectScrapeOutcome {
        confidence: 0.9,
        ..DirectScrapeOutcome::default()
    };
    assert_eq!(
        fallback_reason(&outcome, SourceType::Directory),
        Some(FallbackReason::NoRecords)
    );

    outcome.records = agent_records();
    assert_eq!(fallback_reason(&outcome, SourceType::Directory), None);

    outcome.confidence = 0.39;
    assert!(matches!(
        fallback_reason(&outcome, SourceType::Directory),
        Some(FallbackReason::LowConfidence { .. })
    ));

    outcome.confidence = 0.8;
    outcome.records.truncate(1);
    assert_eq!(
        fallback_reason(&outcome, SourceType::Directory),
        Some(FallbackReason::TooFewRecords { found: 1 })
    );
    assert_eq!(fallback_reason(&outcome, SourceType::SingleVenueBlog), None);
}

// ---------------------------------------------------------------------------
// ExtractionEngine
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_hybrid_run_uses_agent_and_learns() {
    let store = Arc::new(MemoryStore::new());
    let source = source(ExtractionMode::Hybrid, PatternLearningStatus::NotStarted);
    store.insert_source(source.clone());
    let agent = FakeAgent::returning(agent_records());

    let report = engine(agent.clone(), &store)
        .extract(&source, &page(&listing_html()))
        .await;

    assert_eq!(
        report.decision,
        ModeDecision::Agent {
            reason: AgentReason::LearningNotStarted
        }
    );
    assert_eq!(report.extractor, Some(ExtractorUsed::Agent));
    assert_eq!(report.records.len(), 5);
    assert!(report.records.iter().all(|r| r.source_name == "autophoto"));
    assert_eq!(agent.calls(), 1);

    let learning = report.learning.expect("learner ran");
    assert!(learning.success);
    assert!(!store.all_patterns(source.id).is_empty());

    let stored = store.source(source.id).unwrap();
    assert_eq!(stored.pattern_learning_status, PatternLearningStatus::Completed);
    assert!(stored.pattern_learned_at.is_some());
}

#[tokio::test]
async fn second_run_goes_direct_without_calling_agent() {
    let store = Arc::new(MemoryStore::new());
    let source = source(ExtractionMode::Hybrid, PatternLearningStatus::NotStarted);
    store.insert_source(source.clone());
    let agent = FakeAgent::returning(agent_records());
    let engine = engine(agent.clone(), &store);

    engine.extract(&source, &page(&listing_html())).await;
    let learned = store.source(source.id).unwrap();
    let report = engine.extract(&learned, &page(&listing_html())).await;

    assert_eq!(report.decision, ModeDecision::HybridWithFallback);
    assert_eq!(report.extractor, Some(ExtractorUsed::Direct));
    assert!(!report.fell_back());
    assert_eq!(report.records.len(), 5);
    assert_eq!(agent.calls(), 1);
    assert!(report.learning.is_none());
    assert!(!store.validation_events().is_empty());
}

#[tokio::test]
async fn stale_patterns_are_relearned_then_used_directly() {
    let store = Arc::new(MemoryStore::new());
    let source = source(ExtractionMode::Hybrid, PatternLearningStatus::NotStarted);
    store.insert_source(source.clone());
    let agent = FakeAgent::returning(agent_records());
    let engine = engine(agent.clone(), &store);
    let html = listing_html();

    engine.extract(&source, &page(&html)).await;
    let aged: Vec<LearnedPattern> = store
        .all_patterns(source.id)
        .into_iter()
        .map(|mut p| {
            p.learned_at = Utc::now() - Duration::days(120);
            p
        })
        .collect();
    store.upsert_patterns(&aged).await.unwrap();
    let learned = store.source(source.id).unwrap();
    assert_eq!(learned.pattern_learning_status, PatternLearningStatus::Completed);

    let refresh = engine.extract(&learned, &page(&html)).await;

    assert!(matches!(
        refresh.decision,
        ModeDecision::Agent {
            reason: AgentReason::StalePatterns { .. }
        }
    ));
    assert!(refresh.learning.expect("learner ran again").success);
    assert!(store
        .all_patterns(source.id)
        .iter()
        .all(|p| (Utc::now() - p.learned_at).num_days() < 1));

    let next = engine
        .extract(&store.source(source.id).unwrap(), &page(&html))
        .await;

    assert_eq!(next.decision, ModeDecision::HybridWithFallback);
    assert_eq!(next.extractor, Some(ExtractorUsed::Direct));
    assert_eq!(agent.calls(), 2);
}

#[tokio::test]
async fn failed_refresh_keeps_source_completed() {
    let store = Arc::new(MemoryStore::new());
    let source = source(ExtractionMode::Hybrid, PatternLearningStatus::Completed);
    store.insert_source(source.clone());
    store
        .upsert_patterns(&[
            pattern(&source, PatternField::Name, "h1", 0.7),
            pattern(&source, PatternField::Address, "address", 0.7),
        ])
        .await
        .unwrap();
    let agent = FakeAgent::returning(vec![CandidateRecord {
        name: "Not On The Page".to_string(),
        address: "1 Nowhere Rd".to_string(),
        ..CandidateRecord::default()
    }]);

    let html = "<body><h1>The Booth at Joe's</h1><p>Come visit!</p></body>";
    let report = engine(agent, &store).extract(&source, &page(html)).await;

    assert!(report.fell_back());
    assert!(!report.learning.expect("refresh attempted").success);
    let stored = store.source(source.id).unwrap();
    assert_eq!(stored.pattern_learning_status, PatternLearningStatus::Completed);
    assert_eq!(store.all_patterns(source.id).len(), 2);
}

#[tokio::test]
async fn direct_failure_falls_back_to_agent() {
    let store = Arc::new(MemoryStore::new());
    let source = source(ExtractionMode::Hybrid, PatternLearningStatus::Completed);
    store.insert_source(source.clone());
    store
        .upsert_patterns(&[
            pattern(&source, PatternField::Name, "h1", 0.7),
            pattern(&source, PatternField::Address, "address", 0.7),
        ])
        .await
        .unwrap();
    let agent = FakeAgent::returning(agent_records());

    // No repeated containers and no address element: zero valid records.
    let html = "<body><h1>The Booth at Joe's</h1><p>Come visit!</p></body>";
    let report = engine(agent.clone(), &store)
        .extract(&source, &page(html))
        .await;

    assert_eq!(report.fallback, Some(FallbackReason::NoRecords));
    assert_eq!(report.extractor, Some(ExtractorUsed::Agent));
    assert_eq!(report.records.len(), 5);
    assert_eq!(agent.calls(), 1);
    let direct = report.direct.expect("direct attempted first");
    assert!(direct.container_selector.is_none());
    assert_eq!(direct.dropped, 1);
}

#[tokio::test]
async fn unavailable_agent_is_reported_not_fatal() {
    let store = Arc::new(MemoryStore::new());
    let source = source(ExtractionMode::Agent, PatternLearningStatus::NotStarted);
    store.insert_source(source.clone());

    let report = engine(FakeAgent::unavailable(), &store)
        .extract(&source, &page(&listing_html()))
        .await;

    assert!(report.records.is_empty());
    assert!(report.extractor.is_none());
    assert!(report.errors[0].contains("not configured"));
    assert!(report.learning.is_none());
    assert_eq!(
        store.source(source.id).unwrap().pattern_learning_status,
        PatternLearningStatus::NotStarted
    );
}

#[tokio::test]
async fn failed_learning_marks_source_failed() {
    let store = Arc::new(MemoryStore::new());
    let source = source(ExtractionMode::Direct, PatternLearningStatus::NotStarted);
    store.insert_source(source.clone());
    let agent = FakeAgent::returning(vec![CandidateRecord {
        name: "Not On The Page".to_string(),
        address: "1 Nowhere Rd".to_string(),
        ..CandidateRecord::default()
    }]);

    let report = engine(agent, &store)
        .extract(&source, &page(&listing_html()))
        .await;

    assert_eq!(report.records.len(), 1);
    assert!(!report.learning.unwrap().success);
    let stored = store.source(source.id).unwrap();
    assert_eq!(stored.pattern_learning_status, PatternLearningStatus::Failed);
    assert_eq!(stored.extraction_mode, ExtractionMode::Hybrid);
}

#[tokio::test]
async fn hybrid_keeps_direct_records_when_agent_is_down() {
    let store = Arc::new(MemoryStore::new());
    let source = source(ExtractionMode::Hybrid, PatternLearningStatus::Completed);
    store.insert_source(source.clone());
    store
        .upsert_patterns(&[
            pattern(&source, PatternField::Name, "h1", 0.7),
            pattern(&source, PatternField::Address, "address", 0.7),
        ])
        .await
        .unwrap();

    let html = "<body><h1>The Booth at Joe's</h1><address>1 Main St</address></body>";
    let report = engine(FakeAgent::unavailable(), &store)
        .extract(&source, &page(html))
        .await;

    assert_eq!(report.fallback, Some(FallbackReason::TooFewRecords { found: 1 }));
    assert_eq!(report.extractor, Some(ExtractorUsed::Direct));
    assert_eq!(report.records.len(), 1);
    assert!(!report.errors.is_empty());
}
