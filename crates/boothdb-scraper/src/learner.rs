//! Pattern learning from successful AI extractions.
//!
//! The learner locates each extracted value in the page markup, describes
//! the element holding it relative to its venue container, and votes
//! across records. The winning description per field becomes a
//! [`LearnedPattern`]; runners-up and field heuristics become fallbacks.

use std::collections::HashMap;
use std::sync::LazyLock;

use boothdb_core::{
    normalize_text, CandidateRecord, LearnedPattern, PageContent, PatternField,
    PatternRepository, PatternType, SourceConfig,
};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::analysis::{analyze_structure, element_text, find_containers, is_css_identifier};
use crate::direct::{get_field, parse_css, COMPOUND_SEPARATOR};
use crate::error::ScraperError;
use crate::transforms::{has_label, CURRENCY, CURRENCY_PATTERN, STRIP_LABEL};

static ANY_ELEMENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("*").expect("valid selector"));
static CURRENCY_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(CURRENCY_PATTERN).expect("valid regex"));

const MIN_CONFIDENCE: f64 = 0.5;
const CONFIDENCE_SPAN: f64 = 0.2;
const MAX_FALLBACKS: usize = 4;

/// Attributes whose values may carry a field.
const VALUE_ATTRIBUTES: &[&str] = &["content", "title", "aria-label"];

/// Layout classes that say nothing about the content.
const GENERIC_CLASSES: &[&str] = &[
    "row", "col", "container", "wrapper", "inner", "clearfix", "item", "text", "small", "flex",
];

/// Outcome of one learning run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LearningOutcome {
    pub success: bool,
    pub patterns: Vec<LearnedPattern>,
    pub container_selector: Option<String>,
    pub records_analyzed: usize,
    /// Records with at least one value located in the markup.
    pub records_matched: usize,
    pub errors: Vec<String>,
}

impl LearningOutcome {
    fn failed(records_analyzed: usize, error: impl Into<String>) -> Self {
        Self {
            records_analyzed,
            errors: vec![error.into()],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn fields(&self) -> Vec<PatternField> {
        let mut fields: Vec<PatternField> = self.patterns.iter().map(|p| p.field_name).collect();
        fields.sort();
        fields.dedup();
        fields
    }
}

/// Where a value was found.
struct Located<'a> {
    element: ElementRef<'a>,
    attribute: Option<String>,
    exact: bool,
}

/// A proposed rule for one field, before voting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CandidateKey {
    pattern_type: PatternType,
    selector: String,
    attribute: Option<String>,
}

#[derive(Debug, Clone)]
struct Candidate {
    key: CandidateKey,
    transform: Option<&'static str>,
    /// Heuristic certainty, 0-1.
    strength: f64,
    votes: usize,
}

/// Infer one pattern per extractable field from `records` and the page
/// they were extracted from. Pure; see [`learn_and_store`] to persist.
#[must_use]
pub fn learn_patterns(
    page: &PageContent,
    source: &SourceConfig,
    records: &[CandidateRecord],
) -> LearningOutcome {
    if records.is_empty() {
        return LearningOutcome::failed(0, "no extracted records to learn from");
    }
    if page.html.trim().is_empty() {
        return LearningOutcome::failed(records.len(), "page has no markup to learn from");
    }

    let document = Html::parse_document(&page.html);
    let structure = analyze_structure(&document);
    let containers = find_containers(&document);

    tracing::debug!(
        source = %source.slug,
        container_selector = containers.selector.as_deref().unwrap_or("<page>"),
        containers = containers.elements.len(),
        repeated_classes = structure.repeated_classes.len(),
        data_attributes = structure.data_attributes.len(),
        has_list = structure.has_list,
        has_table = structure.has_table,
        "analyzed page structure"
    );

    let mut candidates: HashMap<PatternField, Vec<Candidate>> = HashMap::new();
    let mut values_seen: HashMap<PatternField, usize> = HashMap::new();
    let mut currency_hits = 0usize;
    let mut records_matched = 0usize;

    for record in records {
        let Some(container) = container_for(&containers.elements, record) else {
            tracing::debug!(source = %source.slug, name = %record.name, "record not found on page");
            continue;
        };
        let mut matched_any = false;

        for field in PatternField::ALL {
            let Some(value) = get_field(record, field) else {
                continue;
            };
            *values_seen.entry(field).or_default() += 1;
            if field == PatternField::Cost && CURRENCY_RE.is_match(value) {
                currency_hits += 1;
            }

            let Some(located) = locate_value(container, value) else {
                continue;
            };
            let Some(candidate) = describe(container, &located, field) else {
                continue;
            };
            matched_any = true;
            let bucket = candidates.entry(field).or_default();
            match bucket.iter_mut().find(|c| c.key == candidate.key) {
                Some(existing) => existing.votes += 1,
                None => bucket.push(candidate),
            }
        }

        if matched_any {
            records_matched += 1;
        }
    }

    let mut patterns = Vec::new();
    for field in PatternField::ALL {
        let seen = values_seen.get(&field).copied().unwrap_or(0);
        if seen == 0 {
            continue;
        }
        if let Some(mut bucket) = candidates.remove(&field) {
            bucket.sort_by(|a, b| {
                b.votes
                    .cmp(&a.votes)
                    .then(b.strength.total_cmp(&a.strength))
            });
            patterns.push(build_pattern(source, field, &bucket, seen));
        }
        if field == PatternField::Cost && currency_hits > 0 {
            patterns.push(currency_pattern(source, currency_hits, seen));
        }
    }

    let mut errors = Vec::new();
    if patterns.is_empty() {
        errors.push("no extracted values could be located in the page markup".to_string());
    }

    LearningOutcome {
        success: !patterns.is_empty(),
        patterns,
        container_selector: containers.selector,
        records_analyzed: records.len(),
        records_matched,
        errors,
    }
}

/// Learn patterns and upsert them for the source.
///
/// # Errors
///
/// Returns [`ScraperError::Repository`] if the patterns cannot be stored.
pub async fn learn_and_store(
    repository: &dyn PatternRepository,
    page: &PageContent,
    source: &SourceConfig,
    records: &[CandidateRecord],
) -> Result<LearningOutcome, ScraperError> {
    let outcome = learn_patterns(page, source, records);
    if outcome.success {
        let written = repository.upsert_patterns(&outcome.patterns).await?;
        tracing::info!(
            source = %source.slug,
            patterns = written,
            fields = ?outcome.fields(),
            records_matched = outcome.records_matched,
            "stored learned patterns"
        );
    } else {
        tracing::warn!(
            source = %source.slug,
            errors = ?outcome.errors,
            "pattern learning produced no patterns"
        );
    }
    Ok(outcome)
}

/// The container whose text holds the record's name.
fn container_for<'a>(
    containers: &[ElementRef<'a>],
    record: &CandidateRecord,
) -> Option<ElementRef<'a>> {
    if let [only] = containers {
        return Some(*only);
    }
    let name = normalize_text(&record.name);
    if name.is_empty() {
        return None;
    }
    containers
        .iter()
        .find(|c| normalize_text(&element_text(**c)).contains(&name))
        .copied()
}

/// Most specific descendant of `container` carrying `value`: an exact text
/// match, then an exact attribute match, then the shortest element whose
/// text contains the value.
fn locate_value<'a>(container: ElementRef<'a>, value: &str) -> Option<Located<'a>> {
    let target = normalize_text(value);
    if target.is_empty() {
        return None;
    }

    let mut containing: Option<(usize, ElementRef<'a>)> = None;
    let mut by_attribute: Option<Located<'a>> = None;

    for element in container.select(&ANY_ELEMENT) {
        let text = normalize_text(&element_text(element));
        if text == target {
            return Some(Located {
                element,
                attribute: None,
                exact: true,
            });
        }
        if by_attribute.is_none() {
            by_attribute = element
                .value()
                .attrs()
                .find(|(name, v)| {
                    (name.starts_with("data-") || VALUE_ATTRIBUTES.contains(name))
                        && normalize_text(v) == target
                })
                .map(|(name, _)| Located {
                    element,
                    attribute: Some(name.to_string()),
                    exact: true,
                });
        }
        if text.contains(&target) {
            let len = text.chars().count();
            if containing.is_none_or(|(best, _)| len < best) {
                containing = Some((len, element));
            }
        }
    }

    by_attribute.or_else(|| {
        containing.map(|(_, element)| Located {
            element,
            attribute: None,
            exact: false,
        })
    })
}

/// Describe the located element as a selector relative to the container.
fn describe(
    container: ElementRef<'_>,
    located: &Located<'_>,
    field: PatternField,
) -> Option<Candidate> {
    let element = located.element;
    let tag = element.value().name();

    if let Some(attribute) = &located.attribute {
        return Some(Candidate {
            key: CandidateKey {
                pattern_type: PatternType::Css,
                selector: format!("{tag}[{attribute}]"),
                attribute: Some(attribute.clone()),
            },
            transform: None,
            strength: 0.9,
            votes: 1,
        });
    }

    let transform = (!located.exact && has_label(&element_text(element))).then_some(STRIP_LABEL);
    let strength = field_strength(field, element);

    let (pattern_type, selector) = match css_for(element)
        .filter(|css| selects_first(container, css, element))
    {
        Some(css) => (PatternType::Css, css),
        None if selects_first(container, tag, element) => (PatternType::Css, tag.to_string()),
        None => (PatternType::Path, path_from(container, element)?),
    };

    Some(Candidate {
        key: CandidateKey {
            pattern_type,
            selector,
            attribute: None,
        },
        transform,
        strength: if pattern_type == PatternType::Path {
            strength.min(0.5)
        } else {
            strength
        },
        votes: 1,
    })
}

/// `tag[itemprop='x']` or `tag.class` when the element carries either.
fn css_for(element: ElementRef<'_>) -> Option<String> {
    let value = element.value();
    let tag = value.name();
    if let Some(itemprop) = value.attr("itemprop").filter(|p| is_css_identifier(p)) {
        return Some(format!("{tag}[itemprop='{itemprop}']"));
    }
    value
        .classes()
        .find(|c| is_css_identifier(c) && !GENERIC_CLASSES.contains(c))
        .map(|class| format!("{tag}.{class}"))
}

fn selects_first(container: ElementRef<'_>, selector: &str, element: ElementRef<'_>) -> bool {
    Selector::parse(selector)
        .ok()
        .and_then(|s| container.select(&s).next())
        .is_some_and(|first| first.id() == element.id())
}

/// `/`-separated tag path from `container` down to `element`, with a
/// 1-based index wherever same-tag siblings make a step ambiguous.
fn path_from(container: ElementRef<'_>, element: ElementRef<'_>) -> Option<String> {
    let mut segments = Vec::new();
    let mut current = element;
    while current.id() != container.id() {
        let parent = current.parent().and_then(ElementRef::wrap)?;
        let tag = current.value().name();
        if !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        let same_tag: Vec<ElementRef<'_>> = parent
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| c.value().name() == tag)
            .collect();
        if same_tag.len() > 1 {
            let position = same_tag.iter().position(|c| c.id() == current.id())? + 1;
            segments.push(format!("{tag}[{position}]"));
        } else {
            segments.push(tag.to_string());
        }
        current = parent;
    }
    segments.reverse();
    (!segments.is_empty()).then(|| segments.join("/"))
}

fn class_mentions(element: ElementRef<'_>, needles: &[&str]) -> bool {
    let value = element.value();
    value
        .classes()
        .chain(value.attr("itemprop"))
        .map(str::to_ascii_lowercase)
        .any(|c| needles.iter().any(|n| c.contains(n)))
}

/// How strongly the element's shape suggests it holds `field`.
fn field_strength(field: PatternField, element: ElementRef<'_>) -> f64 {
    let tag = element.value().name();
    match field {
        PatternField::Name => {
            if matches!(tag, "h1" | "h2" | "h3" | "h4" | "h5" | "h6") {
                1.0
            } else if class_mentions(element, &["name", "title"]) {
                0.8
            } else if matches!(tag, "strong" | "b" | "a") {
                0.7
            } else {
                0.4
            }
        }
        PatternField::Address => {
            if tag == "address" || class_mentions(element, &["address", "addr", "street"]) {
                1.0
            } else if class_mentions(element, &["location"]) {
                0.7
            } else {
                0.4
            }
        }
        PatternField::City => keyword_strength(element, &["city", "locality"]),
        PatternField::State => keyword_strength(element, &["state", "region"]),
        PatternField::Country => keyword_strength(element, &["country"]),
        PatternField::MachineModel => keyword_strength(element, &["model", "machine"]),
        PatternField::Cost => keyword_strength(element, &["price", "cost"]),
        PatternField::Hours => {
            if tag == "time" {
                1.0
            } else {
                keyword_strength(element, &["hour", "open"])
            }
        }
        PatternField::Description => {
            if class_mentions(element, &["desc", "summary"]) {
                1.0
            } else if tag == "p" {
                0.8
            } else {
                0.4
            }
        }
    }
}

fn keyword_strength(element: ElementRef<'_>, needles: &[&str]) -> f64 {
    if class_mentions(element, needles) {
        1.0
    } else {
        0.5
    }
}

/// CSS fallbacks worth trying for a field when the learned one misses.
fn heuristic_fallbacks(field: PatternField) -> &'static [&'static str] {
    match field {
        PatternField::Name => &["h2", "h3", "h4", ".name", ".title", "strong"],
        PatternField::Address => &[
            "address",
            "[itemprop='streetAddress']",
            ".address",
            ".addr",
            ".location",
        ],
        PatternField::City => &["[itemprop='addressLocality']", ".city", ".locality"],
        PatternField::State => &["[itemprop='addressRegion']", ".state", ".region"],
        PatternField::Country => &["[itemprop='addressCountry']", ".country"],
        PatternField::MachineModel => &[".model", ".machine"],
        PatternField::Cost => &[".price", ".cost"],
        PatternField::Hours => &["[itemprop='openingHours']", ".hours", "time"],
        PatternField::Description => &[".description", "p"],
    }
}

#[allow(clippy::cast_precision_loss)]
fn confidence(strength: f64, hits: usize, seen: usize) -> f64 {
    let hit_ratio = (hits as f64 / seen.max(1) as f64).min(1.0);
    MIN_CONFIDENCE + CONFIDENCE_SPAN * strength.clamp(0.0, 1.0) * hit_ratio
}

fn build_pattern(
    source: &SourceConfig,
    field: PatternField,
    ranked: &[Candidate],
    seen: usize,
) -> LearnedPattern {
    let primary = &ranked[0];
    let key = &primary.key;
    let confidence = confidence(primary.strength, primary.votes, seen);

    if field == PatternField::Cost && key.pattern_type == PatternType::Css && key.attribute.is_none()
    {
        let selector = format!("{}{COMPOUND_SEPARATOR}{CURRENCY_PATTERN}", key.selector);
        return LearnedPattern::new(source.id, field, PatternType::Compound, selector, confidence)
            .with_transform(CURRENCY)
            .with_validation(r"\d");
    }

    let mut pattern =
        LearnedPattern::new(source.id, field, key.pattern_type, key.selector.clone(), confidence);
    if let Some(attribute) = &key.attribute {
        pattern = pattern.with_attribute(attribute);
    }
    if field == PatternField::Cost {
        pattern = pattern.with_transform(CURRENCY).with_validation(r"\d");
    } else if let Some(transform) = primary.transform {
        pattern = pattern.with_transform(transform);
    }

    let mut fallbacks: Vec<String> = ranked[1..]
        .iter()
        .filter(|c| c.key.pattern_type == key.pattern_type && c.key.attribute == key.attribute)
        .map(|c| c.key.selector.clone())
        .collect();
    if key.pattern_type == PatternType::Css && key.attribute.is_none() {
        fallbacks.extend(
            heuristic_fallbacks(field)
                .iter()
                .filter(|s| parse_css(s).is_ok())
                .map(|s| (*s).to_string()),
        );
    }
    let mut unique = Vec::new();
    for selector in fallbacks {
        if selector != key.selector && !unique.contains(&selector) {
            unique.push(selector);
        }
    }
    unique.truncate(MAX_FALLBACKS);

    pattern.with_fallbacks(unique)
}

/// Page-wide currency regex for `cost`.
fn currency_pattern(source: &SourceConfig, hits: usize, seen: usize) -> LearnedPattern {
    LearnedPattern::new(
        source.id,
        PatternField::Cost,
        PatternType::Regex,
        CURRENCY_PATTERN,
        confidence(0.8, hits, seen),
    )
    .with_transform(CURRENCY)
    .with_validation(r"\d")
}

#[cfg(test)]
#[path = "learner_test.rs"]
mod tests;
