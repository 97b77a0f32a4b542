use super::*;
use boothdb_core::{ExtractionMode, PatternLearningStatus, SourceType};
use chrono::Utc;
use uuid::Uuid;

use crate::direct::scrape_direct;

const LISTING: &str = r#"
<html><body>
  <header><h1>Booth locator</h1></header>
  <div class="booth">
    <h3>Musée Mécanique</h3>
    <p class="addr">Address: Pier 45</p>
    <span class="city">San Francisco</span>
    <div class="meta"><p>Model 21</p><p>Price: $1.00 per strip</p></div>
  </div>
  <div class="booth">
    <h3>Photoworks</h3>
    <p class="addr">Address: 2 Bedford Ave</p>
    <span class="city">Brooklyn</span>
    <div class="meta"><p>Model 14</p><p>Price: $5.00</p></div>
  </div>
  <div class="booth">
    <h3>Ace Hotel</h3>
    <p class="addr">Address: 20 W 29th St</p>
    <span class="city">New York</span>
    <div class="meta"><p>Model 11</p><p>Price: $4.00</p></div>
  </div>
</body></html>
"#;

fn source() -> SourceConfig {
    SourceConfig {
        id: Uuid::new_v4(),
        name: "Photobooth.net".to_string(),
        slug: "photobooth-net".to_string(),
        url: "https://photobooth.net/locations/".to_string(),
        source_type: SourceType::Directory,
        extraction_mode: ExtractionMode::Hybrid,
        pattern_learning_status: PatternLearningStatus::NotStarted,
        pattern_learned_at: None,
        enabled: true,
    }
}

fn page(html: &str) -> PageContent {
    PageContent {
        url: "https://photobooth.net/locations/".to_string(),
        html: html.to_string(),
        markdown: None,
    }
}

fn ai_record(name: &str, address: &str, city: &str, model: &str, cost: &str) -> CandidateRecord {
    CandidateRecord {
        name: name.to_string(),
        address: address.to_string(),
        city: Some(city.to_string()),
        machine_model: Some(model.to_string()),
        cost: Some(cost.to_string()),
        source_name: "photobooth-net".to_string(),
        ..CandidateRecord::default()
    }
}

fn ai_records() -> Vec<CandidateRecord> {
    vec![
        ai_record("Musée Mécanique", "Pier 45", "San Francisco", "Model 21", "$1.00"),
        ai_record("Photoworks", "2 Bedford Ave", "Brooklyn", "Model 14", "$5.00"),
    ]
}

fn pattern_for(outcome: &LearningOutcome, field: PatternField) -> &LearnedPattern {
    outcome
        .patterns
        .iter()
        .find(|p| p.field_name == field)
        .unwrap_or_else(|| panic!("no pattern for {field}"))
}

#[test]
fn zero_records_is_unsuccessful() {
    let outcome = learn_patterns(&page(LISTING), &source(), &[]);
    assert!(!outcome.success);
    assert!(outcome.patterns.is_empty());
    assert_eq!(outcome.errors.len(), 1);
}

#[test]
fn learns_heading_for_name_and_labelled_address() {
    let outcome = learn_patterns(&page(LISTING), &source(), &ai_records());

    assert!(outcome.success);
    assert_eq!(outcome.container_selector.as_deref(), Some(".booth"));
    assert_eq!(outcome.records_matched, 2);

    let name = pattern_for(&outcome, PatternField::Name);
    assert_eq!(name.pattern_type, PatternType::Css);
    assert_eq!(name.selector, "h3");
    assert!(name.required);
    assert!((name.confidence_score - 0.7).abs() < 1e-9);
    assert!(!name.fallback_selectors.contains(&"h3".to_string()));

    let address = pattern_for(&outcome, PatternField::Address);
    assert_eq!(address.selector, "p.addr");
    assert_eq!(address.transform.as_deref(), Some("strip_label"));

    let city = pattern_for(&outcome, PatternField::City);
    assert_eq!(city.selector, "span.city");
}

#[test]
fn confidences_stay_in_learning_band() {
    let outcome = learn_patterns(&page(LISTING), &source(), &ai_records());
    for pattern in &outcome.patterns {
        assert!(
            (0.5..=0.7).contains(&pattern.confidence_score),
            "{} has {}",
            pattern.field_name,
            pattern.confidence_score
        );
        assert!(pattern.fallback_selectors.len() <= 4);
    }
}

#[test]
fn cost_prefers_currency_regex() {
    let outcome = learn_patterns(&page(LISTING), &source(), &ai_records());
    let cost: Vec<&LearnedPattern> = outcome
        .patterns
        .iter()
        .filter(|p| p.field_name == PatternField::Cost)
        .collect();
    assert!(cost.iter().any(|p| p.pattern_type == PatternType::Regex));
    assert!(cost
        .iter()
        .all(|p| p.transform.as_deref() == Some("currency")));
}

#[test]
fn classless_elements_get_tag_paths() {
    let outcome = learn_patterns(&page(LISTING), &source(), &ai_records());
    let model = pattern_for(&outcome, PatternField::MachineModel);
    assert_eq!(model.pattern_type, PatternType::Path);
    assert_eq!(model.selector, "div/p[1]");
}

#[test]
fn learned_patterns_reproduce_the_extraction() {
    let source = source();
    let outcome = learn_patterns(&page(LISTING), &source, &ai_records());

    let direct = scrape_direct(&page(LISTING), &source, &outcome.patterns);

    assert_eq!(direct.records.len(), 3);
    let ace = &direct.records[2];
    assert_eq!(ace.name, "Ace Hotel");
    assert_eq!(ace.address, "20 W 29th St");
    assert_eq!(ace.city.as_deref(), Some("New York"));
    assert_eq!(ace.machine_model.as_deref(), Some("Model 11"));
    assert_eq!(ace.cost.as_deref(), Some("$4.00"));
    assert!(direct.confidence > 0.9, "got {}", direct.confidence);
}

#[test]
fn data_attributes_become_attribute_patterns() {
    let html = r#"<body>
        <article><h2>Musée Mécanique</h2><span data-street="Pier 45"></span></article>
        <article><h2>Photoworks</h2><span data-street="2 Bedford Ave"></span></article>
    </body>"#;
    let records = vec![
        CandidateRecord {
            name: "Musée Mécanique".to_string(),
            address: "Pier 45".to_string(),
            ..CandidateRecord::default()
        },
        CandidateRecord {
            name: "Photoworks".to_string(),
            address: "2 Bedford Ave".to_string(),
            ..CandidateRecord::default()
        },
    ];

    let outcome = learn_patterns(&page(html), &source(), &records);

    let address = pattern_for(&outcome, PatternField::Address);
    assert_eq!(address.selector, "span[data-street]");
    assert_eq!(address.attribute_name.as_deref(), Some("data-street"));
    assert!(address.fallback_selectors.is_empty());
}

#[test]
fn values_missing_from_markup_produce_no_patterns() {
    let records = vec![CandidateRecord {
        name: "Somewhere Else Entirely".to_string(),
        address: "99 Unknown Rd".to_string(),
        ..CandidateRecord::default()
    }];
    let html = "<body><h1>Unrelated page</h1><p>Nothing here</p></body>";

    let outcome = learn_patterns(&page(html), &source(), &records);

    assert!(!outcome.success);
    assert_eq!(outcome.records_matched, 0);
    assert!(!outcome.errors.is_empty());
}

#[test]
fn patterns_target_the_source() {
    let source = source();
    let outcome = learn_patterns(&page(LISTING), &source, &ai_records());
    assert!(outcome.patterns.iter().all(|p| p.source_id == source.id));
    assert!(outcome.patterns.iter().all(|p| p.is_active));
    assert!(outcome.patterns.iter().all(|p| p.learned_at <= Utc::now()));
}
