//! Merge strategies for confirmed duplicates.

use boothdb_core::similarity::normalize_text;
use boothdb_core::{CandidateRecord, DuplicateMatch, MergeStrategy};

const DESCRIPTION_SEPARATOR: &str = "\n\n";

/// Merge `duplicate` into `primary` with the given strategy.
#[must_use]
pub fn merge_booths(
    primary: &CandidateRecord,
    duplicate: &CandidateRecord,
    strategy: MergeStrategy,
) -> CandidateRecord {
    match strategy {
        MergeStrategy::KeepPrimary => keep_primary(primary, duplicate),
        MergeStrategy::MergeFields => merge_fields(primary, duplicate),
    }
}

/// Merge the two sides of a match using its own primary and strategy.
#[must_use]
pub fn merge_match(duplicate: &DuplicateMatch) -> CandidateRecord {
    merge_booths(
        duplicate.primary(),
        duplicate.duplicate(),
        duplicate.merge_strategy,
    )
}

fn is_blank(value: Option<&String>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn fill<T: Clone>(target: &mut Option<T>, other: Option<&T>) {
    if target.is_none() {
        *target = other.cloned();
    }
}

fn fill_text(target: &mut Option<String>, other: Option<&String>) {
    if is_blank(target.as_ref()) && !is_blank(other) {
        *target = other.cloned();
    }
}

fn union_photos(a: &[String], b: &[String]) -> Vec<String> {
    let mut photos = a.to_vec();
    for photo in b {
        if !photos.contains(photo) {
            photos.push(photo.clone());
        }
    }
    photos
}

/// Text fields shared by both strategies, each filled when blank.
fn text_fields(record: &mut CandidateRecord) -> [&mut Option<String>; 13] {
    [
        &mut record.city,
        &mut record.state,
        &mut record.country,
        &mut record.postal_code,
        &mut record.machine_model,
        &mut record.machine_manufacturer,
        &mut record.booth_type,
        &mut record.photo_type,
        &mut record.cost,
        &mut record.hours,
        &mut record.phone,
        &mut record.website,
        &mut record.description,
    ]
}

fn other_text_fields(record: &CandidateRecord) -> [Option<&String>; 13] {
    [
        record.city.as_ref(),
        record.state.as_ref(),
        record.country.as_ref(),
        record.postal_code.as_ref(),
        record.machine_model.as_ref(),
        record.machine_manufacturer.as_ref(),
        record.booth_type.as_ref(),
        record.photo_type.as_ref(),
        record.cost.as_ref(),
        record.hours.as_ref(),
        record.phone.as_ref(),
        record.website.as_ref(),
        record.description.as_ref(),
    ]
}

/// Keep every primary value; fill only the primary's missing fields from
/// the duplicate and union the photo lists.
#[must_use]
pub fn keep_primary(primary: &CandidateRecord, duplicate: &CandidateRecord) -> CandidateRecord {
    let mut merged = primary.clone();

    if merged.name.trim().is_empty() {
        merged.name.clone_from(&duplicate.name);
    }
    if merged.address.trim().is_empty() {
        merged.address.clone_from(&duplicate.address);
    }
    for (target, other) in text_fields(&mut merged)
        .into_iter()
        .zip(other_text_fields(duplicate))
    {
        fill_text(target, other);
    }
    if merged.coordinates().is_none() {
        if let Some(c) = duplicate.coordinates() {
            merged.set_coordinates(c);
        }
    }
    fill(&mut merged.status, duplicate.status.as_ref());
    fill(&mut merged.accepts_cash, duplicate.accepts_cash.as_ref());
    fill(&mut merged.accepts_card, duplicate.accepts_card.as_ref());
    merged.photos = union_photos(&primary.photos, &duplicate.photos);

    merged
}

/// Field-by-field union for equally trusted records.
///
/// Non-empty values win over empty ones, the longer name wins, "has a
/// feature" flags are OR-ed, and differing descriptions are concatenated.
#[must_use]
pub fn merge_fields(a: &CandidateRecord, b: &CandidateRecord) -> CandidateRecord {
    let mut merged = keep_primary(a, b);

    if b.name.trim().chars().count() > a.name.trim().chars().count() {
        merged.name.clone_from(&b.name);
    }
    merged.accepts_cash = or_flags(a.accepts_cash, b.accepts_cash);
    merged.accepts_card = or_flags(a.accepts_card, b.accepts_card);
    merged.description = concat_descriptions(a.description.as_ref(), b.description.as_ref());

    merged
}

fn or_flags(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), _) | (_, Some(false)) => Some(false),
        (None, None) => None,
    }
}

fn concat_descriptions(a: Option<&String>, b: Option<&String>) -> Option<String> {
    match (a.filter(|d| !d.trim().is_empty()), b.filter(|d| !d.trim().is_empty())) {
        (Some(x), Some(y)) if normalize_text(x) == normalize_text(y) => Some(x.clone()),
        (Some(x), Some(y)) if x.contains(y.as_str()) => Some(x.clone()),
        (Some(x), Some(y)) => Some(format!("{x}{DESCRIPTION_SEPARATOR}{y}")),
        (Some(x), None) | (None, Some(x)) => Some(x.clone()),
        (None, None) => None,
    }
}
