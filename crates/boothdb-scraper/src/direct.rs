//! Pattern-based extraction without the AI extractor.

use std::collections::HashMap;
use std::time::Instant;

use boothdb_core::{
    CandidateRecord, ExtractionMethod, LearnedPattern, PageContent, PatternField, PatternType,
    PatternValidationEvent, SourceConfig, SourceType,
};
use chrono::Utc;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use uuid::Uuid;

use crate::analysis::{block_text, element_text, find_containers};
use crate::error::ScraperError;
use crate::transforms::apply_transform;

/// Separator between the CSS and regex halves of a compound selector.
pub const COMPOUND_SEPARATOR: &str = " :: ";

const RECORD_RATIO_WEIGHT: f64 = 0.6;
const FIRED_RATIO_WEIGHT: f64 = 0.4;

/// Expected venue count on non-blog pages is never below this.
const MIN_EXPECTED_RECORDS: usize = 2;

/// Attempt/success counters for one pattern over one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternStats {
    pub pattern_id: Uuid,
    pub field: PatternField,
    pub selector: String,
    pub attempts: usize,
    pub successes: usize,
    /// Successes that came from a fallback selector.
    pub fallback_hits: usize,
    /// Set when the pattern could not be compiled.
    pub error: Option<String>,
}

impl PatternStats {
    #[must_use]
    pub fn fired(&self) -> bool {
        self.successes > 0
    }
}

/// Result of one Direct run over one page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DirectScrapeOutcome {
    pub records: Vec<CandidateRecord>,
    /// 0-1; feeds the hybrid fallback decision.
    pub confidence: f64,
    pub container_selector: Option<String>,
    pub containers_found: usize,
    pub expected_records: usize,
    /// Candidates dropped for lacking a name or address.
    pub dropped: usize,
    pub pattern_stats: Vec<PatternStats>,
    #[serde(skip)]
    pub validation_events: Vec<PatternValidationEvent>,
}

impl DirectScrapeOutcome {
    #[must_use]
    pub fn patterns_fired(&self) -> usize {
        self.pattern_stats.iter().filter(|s| s.fired()).count()
    }
}

/// Expected record count used to score a run.
#[must_use]
pub fn expected_record_count(source_type: SourceType, containers_found: usize) -> usize {
    match source_type {
        SourceType::SingleVenueBlog => 1,
        _ => containers_found.max(MIN_EXPECTED_RECORDS),
    }
}

/// `0.6 * min(records / expected, 1) + 0.4 * (fired / attempted)`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn direct_confidence(records: usize, expected: usize, fired: usize, attempted: usize) -> f64 {
    if attempted == 0 {
        return 0.0;
    }
    let record_ratio = (records as f64 / expected.max(1) as f64).min(1.0);
    let fired_ratio = fired as f64 / attempted as f64;
    RECORD_RATIO_WEIGHT * record_ratio + FIRED_RATIO_WEIGHT * fired_ratio
}

/// A pattern with its selectors parsed once per run.
struct CompiledPattern<'p> {
    pattern: &'p LearnedPattern,
    selectors: Vec<CompiledSelector>,
    validation: Option<Regex>,
}

enum CompiledSelector {
    Css(Selector),
    Path(Vec<PathStep>),
    Regex(Regex),
    Compound(Selector, Regex),
}

struct PathStep {
    tag: String,
    /// 1-based position among same-tag siblings.
    index: Option<usize>,
}

fn compile_pattern(pattern: &LearnedPattern) -> Result<CompiledPattern<'_>, ScraperError> {
    let selectors = std::iter::once(&pattern.selector)
        .chain(pattern.fallback_selectors.iter())
        .map(|raw| compile_selector(pattern.pattern_type, raw))
        .collect::<Result<Vec<_>, _>>()?;
    let validation = pattern
        .validation_regex
        .as_deref()
        .map(compile_regex)
        .transpose()?;
    Ok(CompiledPattern {
        pattern,
        selectors,
        validation,
    })
}

fn compile_selector(pattern_type: PatternType, raw: &str) -> Result<CompiledSelector, ScraperError> {
    match pattern_type {
        PatternType::Css => parse_css(raw).map(CompiledSelector::Css),
        PatternType::Path => parse_path(raw).map(CompiledSelector::Path),
        PatternType::Regex => compile_regex(raw).map(CompiledSelector::Regex),
        PatternType::Compound => {
            let (css, regex) =
                raw.split_once(COMPOUND_SEPARATOR)
                    .ok_or_else(|| ScraperError::InvalidSelector {
                        selector: raw.to_string(),
                        reason: format!("compound selector lacks '{}'", COMPOUND_SEPARATOR.trim()),
                    })?;
            Ok(CompiledSelector::Compound(
                parse_css(css.trim())?,
                compile_regex(regex.trim())?,
            ))
        }
    }
}

pub(crate) fn parse_css(raw: &str) -> Result<Selector, ScraperError> {
    Selector::parse(raw).map_err(|e| ScraperError::InvalidSelector {
        selector: raw.to_string(),
        reason: e.to_string(),
    })
}

fn compile_regex(raw: &str) -> Result<Regex, ScraperError> {
    Regex::new(raw).map_err(|source| ScraperError::InvalidRegex {
        pattern: raw.to_string(),
        source,
    })
}

fn parse_path(raw: &str) -> Result<Vec<PathStep>, ScraperError> {
    raw.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let invalid = || ScraperError::InvalidPath {
                path: raw.to_string(),
                segment: segment.to_string(),
            };
            let (tag, index) = match segment.split_once('[') {
                Some((tag, rest)) => {
                    let index = rest
                        .strip_suffix(']')
                        .and_then(|n| n.parse::<usize>().ok())
                        .filter(|n| *n > 0)
                        .ok_or_else(invalid)?;
                    (tag, Some(index))
                }
                None => (segment, None),
            };
            if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(invalid());
            }
            Ok(PathStep {
                tag: tag.to_ascii_lowercase(),
                index,
            })
        })
        .collect()
}

/// Follow a tag path down from `root`.
fn walk_path<'a>(root: ElementRef<'a>, steps: &[PathStep]) -> Option<ElementRef<'a>> {
    let mut current = root;
    for step in steps {
        let position = step.index.unwrap_or(1);
        current = current
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|child| child.value().name() == step.tag)
            .nth(position - 1)?;
    }
    Some(current)
}

fn read_element(element: ElementRef<'_>, pattern: &LearnedPattern) -> Option<String> {
    match pattern.extraction_method {
        ExtractionMethod::Text => Some(element_text(element)),
        ExtractionMethod::Attribute => pattern
            .attribute_name
            .as_deref()
            .and_then(|attr| element.value().attr(attr))
            .map(str::to_string),
        ExtractionMethod::Markup => Some(element.inner_html().trim().to_string()),
    }
}

fn regex_capture(regex: &Regex, text: &str) -> Option<String> {
    let captures = regex.captures(text)?;
    captures
        .get(1)
        .or_else(|| captures.get(0))
        .map(|m| m.as_str().to_string())
}

fn first_non_empty<'a, I>(elements: I, pattern: &LearnedPattern) -> Option<String>
where
    I: IntoIterator<Item = ElementRef<'a>>,
{
    elements
        .into_iter()
        .filter_map(|el| read_element(el, pattern))
        .find(|v| !v.trim().is_empty())
}

fn apply_selector(
    container: ElementRef<'_>,
    selector: &CompiledSelector,
    pattern: &LearnedPattern,
) -> Option<String> {
    let raw = match selector {
        CompiledSelector::Css(css) => first_non_empty(container.select(css), pattern),
        CompiledSelector::Path(steps) => {
            walk_path(container, steps).and_then(|el| read_element(el, pattern))
        }
        CompiledSelector::Regex(regex) => regex_capture(regex, &block_text(container)),
        CompiledSelector::Compound(css, regex) => container
            .select(css)
            .find_map(|el| regex_capture(regex, &block_text(el))),
    }?;
    let raw = raw.trim().to_string();
    (!raw.is_empty()).then_some(raw)
}

/// Try the primary selector, then each fallback in order. Returns the
/// value and the index of the selector that produced it.
fn extract_field(
    container: ElementRef<'_>,
    compiled: &CompiledPattern<'_>,
) -> Option<(String, usize)> {
    compiled
        .selectors
        .iter()
        .enumerate()
        .find_map(|(index, selector)| {
            let value = apply_selector(container, selector, compiled.pattern)?;
            if let Some(validation) = &compiled.validation {
                if !validation.is_match(&value) {
                    return None;
                }
            }
            let value = match compiled.pattern.transform.as_deref() {
                Some(name) => apply_transform(name, &value),
                None => value,
            };
            (!value.trim().is_empty()).then_some((value, index))
        })
}

/// Write one extracted value onto a record.
pub(crate) fn set_field(record: &mut CandidateRecord, field: PatternField, value: String) {
    match field {
        PatternField::Name => record.name = value,
        PatternField::Address => record.address = value,
        PatternField::City => record.city = Some(value),
        PatternField::State => record.state = Some(value),
        PatternField::Country => record.country = Some(value),
        PatternField::MachineModel => record.machine_model = Some(value),
        PatternField::Cost => record.cost = Some(value),
        PatternField::Hours => record.hours = Some(value),
        PatternField::Description => record.description = Some(value),
    }
}

/// Read one field from a record, if set.
pub(crate) fn get_field(record: &CandidateRecord, field: PatternField) -> Option<&str> {
    let value = match field {
        PatternField::Name => Some(record.name.as_str()),
        PatternField::Address => Some(record.address.as_str()),
        PatternField::City => record.city.as_deref(),
        PatternField::State => record.state.as_deref(),
        PatternField::Country => record.country.as_deref(),
        PatternField::MachineModel => record.machine_model.as_deref(),
        PatternField::Cost => record.cost.as_deref(),
        PatternField::Hours => record.hours.as_deref(),
        PatternField::Description => record.description.as_deref(),
    };
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Default)]
struct RunCounters {
    attempts: usize,
    successes: usize,
    fallback_hits: usize,
    first_value: Option<String>,
    last_index: Option<usize>,
    elapsed_micros: u64,
}

/// Extract candidate records from `page` using the source's patterns.
///
/// Only active patterns at or above the Direct confidence floor are used.
/// Within a field, patterns are tried in descending confidence and the
/// first value wins. Every field failure is local: the record is dropped
/// only when `name` or `address` stays empty.
#[must_use]
pub fn scrape_direct(
    page: &PageContent,
    source: &SourceConfig,
    patterns: &[LearnedPattern],
) -> DirectScrapeOutcome {
    let mut eligible: Vec<&LearnedPattern> = patterns
        .iter()
        .filter(|p| p.is_eligible_for_direct())
        .collect();
    eligible.sort_by(|a, b| {
        a.field_name
            .cmp(&b.field_name)
            .then(b.confidence_score.total_cmp(&a.confidence_score))
    });

    let mut stats = Vec::with_capacity(eligible.len());
    let mut compiled = Vec::with_capacity(eligible.len());
    for pattern in eligible {
        match compile_pattern(pattern) {
            Ok(c) => compiled.push(c),
            Err(e) => {
                tracing::warn!(
                    source = %source.slug,
                    pattern_id = %pattern.id,
                    field = %pattern.field_name,
                    error = %e,
                    "skipping pattern that does not compile"
                );
                stats.push(PatternStats {
                    pattern_id: pattern.id,
                    field: pattern.field_name,
                    selector: pattern.selector.clone(),
                    attempts: 1,
                    successes: 0,
                    fallback_hits: 0,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    let document = Html::parse_document(&page.html);
    let containers = find_containers(&document);
    let containers_found = containers.elements.len();
    let expected_records = expected_record_count(source.source_type, containers_found);

    let mut counters: HashMap<Uuid, RunCounters> = HashMap::new();
    let mut records = Vec::new();
    let mut dropped = 0usize;

    for container in &containers.elements {
        let mut record = CandidateRecord {
            source_name: source.slug.clone(),
            source_url: page.url.clone(),
            ..CandidateRecord::default()
        };
        let mut filled: Vec<PatternField> = Vec::new();

        for c in &compiled {
            let field = c.pattern.field_name;
            if filled.contains(&field) {
                continue;
            }
            let started = Instant::now();
            let extracted = extract_field(*container, c);
            let elapsed = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

            let entry = counters.entry(c.pattern.id).or_default();
            entry.attempts += 1;
            entry.elapsed_micros = entry.elapsed_micros.saturating_add(elapsed);
            match extracted {
                Some((value, index)) => {
                    entry.successes += 1;
                    if index > 0 {
                        entry.fallback_hits += 1;
                    }
                    entry.last_index = Some(index);
                    if entry.first_value.is_none() {
                        entry.first_value = Some(value.clone());
                    }
                    set_field(&mut record, field, value);
                    filled.push(field);
                }
                None => {
                    tracing::debug!(
                        source = %source.slug,
                        field = %field,
                        selector = %c.pattern.selector,
                        "pattern found nothing in container"
                    );
                }
            }
        }

        match record.sanitized() {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }

    let observed_at = Utc::now();
    let mut validation_events: Vec<PatternValidationEvent> = stats
        .iter()
        .map(|s| PatternValidationEvent {
            pattern_id: s.pattern_id,
            source_id: source.id,
            field_name: s.field,
            success: false,
            extracted_value: None,
            selector_index: None,
            latency_micros: 0,
            observed_at,
        })
        .collect();
    for c in &compiled {
        let counter = counters.remove(&c.pattern.id).unwrap_or_default();
        // Shadowed by a more confident pattern for the same field.
        if counter.attempts == 0 {
            continue;
        }
        validation_events.push(PatternValidationEvent {
            pattern_id: c.pattern.id,
            source_id: source.id,
            field_name: c.pattern.field_name,
            success: counter.successes > 0,
            extracted_value: counter.first_value,
            selector_index: counter.last_index,
            latency_micros: counter.elapsed_micros,
            observed_at,
        });
        stats.push(PatternStats {
            pattern_id: c.pattern.id,
            field: c.pattern.field_name,
            selector: c.pattern.selector.clone(),
            attempts: counter.attempts,
            successes: counter.successes,
            fallback_hits: counter.fallback_hits,
            error: None,
        });
    }

    let attempted = stats.len();
    let fired = stats.iter().filter(|s| s.fired()).count();
    let confidence = direct_confidence(records.len(), expected_records, fired, attempted);

    tracing::debug!(
        source = %source.slug,
        container_selector = containers.selector.as_deref().unwrap_or("<page>"),
        containers_found,
        records = records.len(),
        dropped,
        fired,
        attempted,
        confidence,
        "direct scrape finished"
    );

    DirectScrapeOutcome {
        records,
        confidence,
        container_selector: containers.selector,
        containers_found,
        expected_records,
        dropped,
        pattern_stats: stats,
        validation_events,
    }
}

#[cfg(test)]
#[path = "direct_test.rs"]
mod tests;
