//! Per-source crawl orchestration.
//!
//! One run is: fetch each source page, extract through the decision engine,
//! sanitize, backfill missing coordinates, deduplicate the batch, then
//! reconcile it with the stored catalog. A failing source is logged and
//! recorded in its [`SourceSummary`]; it never aborts the run.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use boothdb_core::{
    AppConfig, CandidateRecord, CatalogRepository, GeocodeConfidence, GeocodeLookup,
    GeocodeQuery, MatchRepository, PageContent, PageFetcher, SourceConfig,
};
use boothdb_dedup::{CatalogOutcome, DedupEngine, TrustTable};
use boothdb_geocode::GeocodeCascade;
use boothdb_scraper::{ExtractionEngine, ExtractorUsed};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::adapters::{HttpAgent, HttpFetcher};
use crate::stores::Stores;

/// What happened to one source.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SourceSummary {
    pub slug: String,
    pub mode: &'static str,
    pub extractor: Option<ExtractorUsed>,
    pub records: usize,
    pub fell_back: bool,
    pub learned_patterns: usize,
    pub errors: Vec<String>,
}

impl SourceSummary {
    fn new(source: &SourceConfig) -> Self {
        Self {
            slug: source.slug.clone(),
            mode: "none",
            extractor: None,
            records: 0,
            fell_back: false,
            learned_patterns: 0,
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct CrawlSummary {
    pub sources: Vec<SourceSummary>,
    pub extracted: usize,
    /// Records dropped by sanitation (blank name or address).
    pub dropped: usize,
    pub geocoded: usize,
    pub merged: usize,
    pub review: usize,
    pub unique: usize,
    /// `None` on dry runs.
    pub catalog: Option<CatalogOutcome>,
}

impl CrawlSummary {
    pub(crate) fn failed_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| s.extractor.is_none() && !s.errors.is_empty())
            .count()
    }
}

/// Collaborators for a crawl run.
pub(crate) struct Pipeline {
    pub fetcher: Arc<dyn PageFetcher>,
    pub engine: ExtractionEngine,
    pub geocoder: Option<Arc<dyn GeocodeLookup>>,
    pub dedup: DedupEngine,
    pub catalog: Arc<dyn CatalogRepository>,
    pub matches: Arc<dyn MatchRepository>,
}

impl Pipeline {
    /// Crawl `sources` with at most `concurrency` pages in flight.
    ///
    /// `content` replaces the fetched page for every source; the CLI only
    /// passes it together with a single `--source`.
    pub(crate) async fn run(
        &self,
        sources: &[SourceConfig],
        content: Option<&str>,
        concurrency: usize,
        dry_run: bool,
    ) -> CrawlSummary {
        let mut summary = CrawlSummary::default();

        let crawled: Vec<(SourceSummary, Vec<CandidateRecord>)> = stream::iter(sources)
            .map(|source| self.crawl_source(source, content))
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut records = Vec::new();
        for (source_summary, extracted) in crawled {
            summary.extracted += extracted.len();
            records.extend(extracted);
            summary.sources.push(source_summary);
        }
        summary.sources.sort_by(|a, b| a.slug.cmp(&b.slug));

        let before = records.len();
        let mut records: Vec<CandidateRecord> = records
            .into_iter()
            .filter_map(CandidateRecord::sanitized)
            .collect();
        summary.dropped = before - records.len();

        summary.geocoded = self.backfill_coordinates(&mut records).await;

        let dedup = self.dedup.deduplicate(records).await;
        summary.merged = dedup.merged.len();
        summary.review = dedup.review.len();
        summary.unique = dedup.records.len();
        tracing::info!(
            extracted = summary.extracted,
            dropped = summary.dropped,
            geocoded = summary.geocoded,
            merged = summary.merged,
            review = summary.review,
            unique = summary.unique,
            "batch deduplicated"
        );

        if dry_run {
            return summary;
        }

        let mut catalog = self
            .dedup
            .queue_reviews(&dedup.review, self.matches.as_ref())
            .await;
        let reconciled = self
            .dedup
            .reconcile_with_catalog(dedup.records, self.catalog.as_ref(), self.matches.as_ref())
            .await;
        catalog.inserted += reconciled.inserted;
        catalog.updated += reconciled.updated;
        catalog.merged_into_catalog += reconciled.merged_into_catalog;
        catalog.queued_for_review += reconciled.queued_for_review;
        catalog.errors.extend(reconciled.errors);
        summary.catalog = Some(catalog);

        summary
    }

    async fn crawl_source(
        &self,
        source: &SourceConfig,
        content: Option<&str>,
    ) -> (SourceSummary, Vec<CandidateRecord>) {
        let mut summary = SourceSummary::new(source);

        let page = match content {
            Some(html) => PageContent {
                url: source.url.clone(),
                html: html.to_string(),
                markdown: None,
            },
            None => match self.fetcher.fetch(&source.url).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(source = %source.slug, error = %e, "failed to fetch source page");
                    summary.errors.push(e.to_string());
                    return (summary, Vec::new());
                }
            },
        };

        let report = self.engine.extract(source, &page).await;
        summary.mode = report.decision.as_str();
        summary.extractor = report.extractor;
        summary.records = report.records.len();
        summary.fell_back = report.fell_back();
        summary.learned_patterns = report
            .learning
            .as_ref()
            .map_or(0, |l| if l.success { l.patterns.len() } else { 0 });
        summary.errors = report.errors;

        tracing::info!(
            source = %source.slug,
            mode = summary.mode,
            records = summary.records,
            fell_back = summary.fell_back,
            "source extracted"
        );
        (summary, report.records)
    }

    /// Resolve coordinates for records that have none. Only medium- or
    /// high-confidence results are written back. Returns the number of
    /// records that gained coordinates.
    async fn backfill_coordinates(&self, records: &mut [CandidateRecord]) -> usize {
        let Some(geocoder) = &self.geocoder else {
            return 0;
        };

        let mut resolved = 0;
        for record in records.iter_mut().filter(|r| r.coordinates().is_none()) {
            let query = GeocodeQuery::from_record(record);
            match geocoder.geocode(&query).await {
                Some(result) if result.confidence >= GeocodeConfidence::Medium => {
                    record.set_coordinates(result.coordinates());
                    resolved += 1;
                }
                Some(result) => {
                    tracing::debug!(
                        name = %record.name,
                        confidence = %result.confidence,
                        "low-confidence geocode not applied"
                    );
                }
                None => {
                    tracing::debug!(name = %record.name, "could not geocode record");
                }
            }
        }
        resolved
    }
}

/// `crawl` command handler.
pub(crate) async fn run_crawl(
    config: &AppConfig,
    source_filter: Option<&str>,
    content_path: Option<&Path>,
    offline: bool,
    dry_run: bool,
    concurrency: usize,
) -> anyhow::Result<()> {
    let content = match content_path {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
        ),
        None => None,
    };

    let stores = if offline {
        Stores::offline(config).await?
    } else {
        Stores::postgres(config).await?
    };

    let registered = stores.sources.list_sources().await?;
    let sources = select_sources(&registered, source_filter)?;
    if sources.is_empty() {
        println!("no enabled sources to crawl");
        return Ok(());
    }

    let geocoder: Arc<dyn GeocodeLookup> = Arc::new(GeocodeCascade::from_config(config)?);
    let pipeline = Pipeline {
        fetcher: Arc::new(HttpFetcher::from_config(config)?),
        engine: ExtractionEngine::new(
            Arc::new(HttpAgent::from_config(config)?),
            stores.sources.clone(),
            stores.patterns.clone(),
        ),
        geocoder: Some(geocoder.clone()),
        dedup: DedupEngine::new(TrustTable::with_sources(&registered)).with_geocoder(geocoder),
        catalog: stores.catalog.clone(),
        matches: stores.matches.clone(),
    };

    let summary = pipeline
        .run(&sources, content.as_deref(), concurrency, dry_run)
        .await;
    print_summary(&summary);

    if summary.failed_sources() == summary.sources.len() {
        anyhow::bail!("every source failed");
    }
    Ok(())
}

/// An explicit slug selects that source even when it is disabled.
fn select_sources(
    registered: &[SourceConfig],
    source_filter: Option<&str>,
) -> anyhow::Result<Vec<SourceConfig>> {
    match source_filter {
        Some(slug) => registered
            .iter()
            .find(|s| s.slug == slug)
            .cloned()
            .map(|s| vec![s])
            .ok_or_else(|| {
                anyhow::anyhow!("unknown source '{slug}'; run `boothdb-cli seed` first")
            }),
        None => Ok(registered.iter().filter(|s| s.enabled).cloned().collect()),
    }
}

fn print_summary(summary: &CrawlSummary) {
    for source in &summary.sources {
        let extractor = source.extractor.map_or("-", ExtractorUsed::as_str);
        println!(
            "{:<28} mode={:<7} extractor={:<6} records={:<4} fallback={}{}",
            source.slug,
            source.mode,
            extractor,
            source.records,
            source.fell_back,
            if source.learned_patterns > 0 {
                format!(" learned={}", source.learned_patterns)
            } else {
                String::new()
            },
        );
        for error in &source.errors {
            println!("    error: {error}");
        }
    }

    println!(
        "extracted={} dropped={} geocoded={} merged={} review={} unique={}",
        summary.extracted,
        summary.dropped,
        summary.geocoded,
        summary.merged,
        summary.review,
        summary.unique,
    );
    match &summary.catalog {
        Some(catalog) => {
            println!(
                "catalog: inserted={} updated={} merged={} queued_for_review={}",
                catalog.inserted,
                catalog.updated,
                catalog.merged_into_catalog,
                catalog.queued_for_review,
            );
            for error in &catalog.errors {
                tracing::error!(error = %error, "catalog write failed");
            }
        }
        None => println!("dry run: catalog untouched"),
    }
}

#[cfg(test)]
#[path = "crawl_test.rs"]
mod tests;
