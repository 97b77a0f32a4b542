//! `dedup` command handler: offline entity resolution over a JSON file.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use boothdb_core::{AppConfig, CandidateRecord, DuplicateMatch};
use boothdb_dedup::{DedupEngine, TrustTable};
use boothdb_geocode::GeocodeCascade;

pub(crate) async fn run_dedup(
    config: &AppConfig,
    input: &Path,
    output: Option<&Path>,
    no_geocode: bool,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let records = parse_records(&raw)
        .with_context(|| format!("{} is not a JSON array of booth records", input.display()))?;

    let mut engine = DedupEngine::new(TrustTable::new());
    if !no_geocode {
        engine = engine.with_geocoder(Arc::new(GeocodeCascade::from_config(config)?));
    }

    let outcome = engine.deduplicate(records).await;
    for duplicate in &outcome.merged {
        println!("merged  {}", describe(duplicate));
    }
    for duplicate in &outcome.review {
        println!("review  {}", describe(duplicate));
    }
    println!(
        "unique={} merged={} review={} passes={} comparisons={} skipped={} geocoded={}",
        outcome.records.len(),
        outcome.merged.len(),
        outcome.review.len(),
        outcome.passes,
        outcome.comparisons,
        outcome.skipped,
        outcome.geocoded,
    );

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&outcome.records)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), records = outcome.records.len(), "wrote deduplicated records");
    }
    Ok(())
}

/// Parses and sanitizes the input; records without a name or address are
/// dropped with a warning.
fn parse_records(raw: &str) -> anyhow::Result<Vec<CandidateRecord>> {
    let parsed: Vec<CandidateRecord> = serde_json::from_str(raw)?;
    let total = parsed.len();
    let records: Vec<CandidateRecord> = parsed
        .into_iter()
        .filter_map(CandidateRecord::sanitized)
        .collect();
    if records.len() < total {
        tracing::warn!(
            dropped = total - records.len(),
            "records without a name or address were dropped"
        );
    }
    Ok(records)
}

fn describe(duplicate: &DuplicateMatch) -> String {
    format!(
        "{:.1} {} \"{}\" <-> \"{}\" ({})",
        duplicate.confidence_score,
        duplicate.match_type,
        duplicate.booth_a.name,
        duplicate.booth_b.name,
        duplicate.recommended_action,
    )
}
