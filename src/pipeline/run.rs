use crate::error::ScoutError;
use crate::geo::GeoEnricher;
use crate::models::{
    brasilia_now, ErrorLogEntry, Listing, ListingKind, LogRecord, RunStatus, RunSummary,
    StoredListing, UrlVariant,
};
use crate::pipeline::{dedupe, Deduplicator, FlushMode};
use crate::scrapers::{PageExtractor, PageRange, PageSource, ScrapeTarget};
use crate::store::{LocalTable, RemoteStore};
use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{error, info, warn};

/// Conflict column for listing upserts
const LISTING_KEY: &str = "listing_key";

/// Remote table names
#[derive(Debug, Clone)]
pub struct Tables {
    pub listings: String,
    /// Run summaries and error entries
    pub log: String,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub pages: PageRange,
    pub kind: ListingKind,
    pub variant: UrlVariant,
    pub flush: FlushMode,
}

/// One scrape run: fetch → extract → dedupe → enrich → write CSV, page by
/// page, then upsert the rows the remote table lacks and record a run summary.
pub struct Pipeline<'a> {
    options: PipelineOptions,
    target: ScrapeTarget,
    source: &'a dyn PageSource,
    extractor: PageExtractor,
    local: LocalTable,
    remote: &'a dyn RemoteStore,
    tables: Tables,
    enricher: Option<GeoEnricher<'a>>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        options: PipelineOptions,
        source: &'a dyn PageSource,
        extractor: PageExtractor,
        local: LocalTable,
        remote: &'a dyn RemoteStore,
        tables: Tables,
    ) -> Self {
        Self {
            options,
            target: ScrapeTarget::default(),
            source,
            extractor,
            local,
            remote,
            tables,
            enricher: None,
        }
    }

    pub fn with_target(mut self, target: ScrapeTarget) -> Self {
        self.target = target;
        self
    }

    /// Fill region and coordinates for every new listing
    pub fn with_enricher(mut self, enricher: GeoEnricher<'a>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let started_at = brasilia_now();
        let mut summary = RunSummary::start(
            self.options.pages.to_string(),
            self.options.variant,
            self.options.kind,
            started_at,
        );

        info!(
            pages = %summary.pages,
            kind = %self.options.kind,
            variant = %self.options.variant,
            flush = %self.options.flush,
            geocode = self.enricher.is_some(),
            source = self.source.source_name(),
            "Starting scrape run"
        );

        match self.execute(&mut summary, started_at).await {
            Ok(rows_added) => {
                summary.rows_added = rows_added;
                summary.finish(RunStatus::Complete);
                if rows_added > 0 {
                    self.write_summary(&summary).await;
                } else {
                    info!("No rows added, run summary not written");
                }
                info!(rows_added, "Run complete");
                Ok(summary)
            }
            Err(e) => {
                error!("Run failed: {:#}", e);
                summary.note_error(format!("{:#}", e));
                summary.finish(RunStatus::Failed);
                self.write_summary(&summary).await;
                Err(e)
            }
        }
    }

    async fn execute(&self, summary: &mut RunSummary, created_at: DateTime<FixedOffset>) -> Result<usize> {
        let mut stored = self.local.load().context("Failed to load local table")?;
        let mut dedup = Deduplicator::seeded(&stored);
        let mut pending = Vec::new();
        let mut new_total = 0;

        for page in self.options.pages.pages() {
            let page_started = Instant::now();
            let url = self.target.page_url(self.options.kind, self.options.variant, page);
            info!(page, %url, "Fetching page");

            let html = self
                .source
                .fetch(&url)
                .await
                .with_context(|| format!("Failed to fetch page {page}"))?;

            let listings = match self.extractor.extract(&html, page) {
                Ok(listings) => listings,
                Err(e @ ScoutError::ExtractionMismatch { .. }) => {
                    warn!("Skipping page {}: {}", page, e);
                    summary.note_error(e.to_string());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let postings = listings.len();
            let new_rows = match self.options.flush {
                FlushMode::PerPage => self.flush(&mut dedup, listings, &mut stored).await?,
                FlushMode::BatchAtEnd => {
                    pending.extend(listings);
                    0
                }
            };

            new_total += new_rows;
            info!(
                page,
                postings,
                new_rows,
                elapsed_ms = page_started.elapsed().as_millis() as u64,
                "Page done"
            );
        }

        if self.options.flush == FlushMode::BatchAtEnd {
            let postings = pending.len();
            let unique = dedupe(pending);
            info!(postings, unique = unique.len(), "Batch collected");
            new_total = self.flush(&mut dedup, unique, &mut stored).await?;
        }

        info!(
            new_rows = new_total,
            known = dedup.seen(),
            path = %self.local.path().display(),
            "Local table updated"
        );
        self.reconcile(&stored, created_at).await
    }

    /// Dedupe, enrich, and append the survivors to the local table. Returns
    /// how many rows were added.
    async fn flush(
        &self,
        dedup: &mut Deduplicator,
        listings: Vec<Listing>,
        stored: &mut Vec<Listing>,
    ) -> Result<usize> {
        let mut fresh = dedup.retain_new(listings);
        if fresh.is_empty() {
            return Ok(0);
        }

        if let Some(enricher) = &self.enricher {
            for listing in fresh.iter_mut() {
                enricher.enrich(listing).await;
            }
        }

        let added = fresh.len();
        stored.extend(fresh);
        self.local
            .save(stored)
            .with_context(|| format!("Failed to write {}", self.local.path().display()))?;

        Ok(added)
    }

    /// Send every locally stored listing the remote table does not have yet,
    /// numbered after the highest remote id. Rows already present keep their
    /// id and are not sent again. A failed row is logged and skipped, so the
    /// next run retries it.
    async fn reconcile(&self, stored: &[Listing], created_at: DateTime<FixedOffset>) -> Result<usize> {
        if stored.is_empty() {
            return Ok(0);
        }

        let existing = self
            .remote
            .select(&self.tables.listings, "id,listing_key")
            .await
            .context("Failed to read existing listings")?;

        let known = known_keys(&existing);
        let missing: Vec<Listing> = stored
            .iter()
            .filter(|listing| !known.contains(&listing.listing_key()))
            .cloned()
            .collect();

        info!(local = stored.len(), remote = existing.len(), missing = missing.len(), "Reconciling");

        let mut added = 0;
        for row in assign_ids(next_id(&existing), &missing, created_at) {
            let id = row.id;
            let payload = serde_json::to_value(&row)?;

            match self.remote.upsert(&self.tables.listings, &payload, Some(LISTING_KEY)).await {
                Ok(()) => {
                    added += 1;
                    info!(id, url = %row.listing.listing_url, "Row inserted successfully");
                }
                Err(e) => {
                    error!(id, "Row insert failed: {}", e);
                    self.log_error(format!("upsert listing {id}"), e.to_string()).await;
                }
            }
        }

        Ok(added)
    }

    async fn write_summary(&self, summary: &RunSummary) {
        let result = match serde_json::to_value(LogRecord::Run(summary.clone())) {
            Ok(payload) => self
                .remote
                .upsert(&self.tables.log, &payload, None)
                .await
                .map_err(anyhow::Error::from),
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            error!("Failed to write run summary: {:#}", e);
            self.log_error("run summary".to_string(), format!("{:#}", e)).await;
        }
    }

    async fn log_error(&self, context: String, message: String) {
        let entry = LogRecord::Error(ErrorLogEntry {
            context,
            message,
            created_at: brasilia_now(),
        });

        let result = match serde_json::to_value(&entry) {
            Ok(payload) => self
                .remote
                .upsert(&self.tables.log, &payload, None)
                .await
                .map_err(anyhow::Error::from),
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            warn!("Failed to record error in log table: {:#}", e);
        }
    }
}

/// One past the highest `id` in `rows`, 1 for an empty table
pub fn next_id(rows: &[Value]) -> i64 {
    rows.iter()
        .filter_map(|row| row.get("id").and_then(Value::as_i64))
        .max()
        .map_or(1, |max| max + 1)
}

fn known_keys(rows: &[Value]) -> HashSet<String> {
    rows.iter()
        .filter_map(|row| row.get(LISTING_KEY).and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Number listings consecutively from `first_id`, in order
pub fn assign_ids(
    first_id: i64,
    fresh: &[Listing],
    created_at: DateTime<FixedOffset>,
) -> Vec<StoredListing> {
    fresh
        .iter()
        .zip(first_id..)
        .map(|(listing, id)| StoredListing {
            id,
            listing_key: listing.listing_key(),
            created_at,
            listing: listing.clone(),
        })
        .collect()
}
