//! Legal catalog enrichment
//!
//! Walks every act listed by the citation source, resolves it to its XML
//! document through the escalator, stores the document under `legal/` and
//! attaches the citing / cited-by relations. The result is a JSON snapshot in
//! the overview directory, independent of the frontier crawl.

use crate::crawler::{fetch_with_retry, Fetcher, RetryPolicy};
use crate::legal::escalator::Escalator;
use crate::legal::resolver::LegalStatus;
use crate::legal::sparql::{CatalogError, CitationRecord, CitationSource};
use crate::output::OutputLayout;
use crate::crawler::text_fingerprint;
use crate::resource::ResourceKind;
use crate::CrawlError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

const DATA_HOST: &str = "fedlex.data.admin.ch";
const WEBSITE_HOST: &str = "www.fedlex.admin.ch";

/// One enriched catalog record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Row returned by the full catalog query
    pub record: CitationRecord,
    pub status: LegalStatus,
    pub resolved_url: String,
    pub storage_location: PathBuf,
    pub fingerprint: String,
    pub citing: Vec<CitationRecord>,
    pub cited_by: Vec<CitationRecord>,
}

/// Counters of a catalog run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogReport {
    pub listed: usize,
    pub skipped_by_offset: usize,
    pub stored: usize,
    pub failed: usize,
    pub snapshots: usize,
}

/// Maps a data URI of an act to its German web page
///
/// ```
/// use admin_crawler::legal::website_uri;
///
/// assert_eq!(
///     website_uri("https://fedlex.data.admin.ch/eli/cc/1959/679_705_685"),
///     "https://www.fedlex.admin.ch/eli/cc/1959/679_705_685/de"
/// );
/// ```
pub fn website_uri(resource_uri: &str) -> String {
    format!("{}/de", resource_uri.replace(DATA_HOST, WEBSITE_HOST))
}

/// Catalog crawler
pub struct CatalogCrawler {
    source: Arc<dyn CitationSource>,
    escalator: Escalator,
    fetcher: Arc<dyn Fetcher>,
    retry: RetryPolicy,
    layout: OutputLayout,
    write: bool,
    snapshot_interval: usize,
    entries: BTreeMap<String, CatalogEntry>,
}

impl CatalogCrawler {
    pub fn new(
        source: Arc<dyn CitationSource>,
        escalator: Escalator,
        fetcher: Arc<dyn Fetcher>,
        layout: OutputLayout,
    ) -> Self {
        Self {
            source,
            escalator,
            fetcher,
            retry: RetryPolicy::default(),
            layout,
            write: true,
            snapshot_interval: 50,
            entries: BTreeMap::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    pub fn with_snapshot_interval(mut self, interval: usize) -> Self {
        self.snapshot_interval = interval.max(1);
        self
    }

    /// Entries keyed by their document file name
    pub fn entries(&self) -> &BTreeMap<String, CatalogEntry> {
        &self.entries
    }

    /// Processes the catalog, skipping records whose index is below `offset`
    ///
    /// Failures of single records are logged and counted; only a failing
    /// catalog listing or snapshot write ends the run.
    pub async fn run(&mut self, offset: usize) -> Result<CatalogReport, CrawlError> {
        let start = Instant::now();
        self.layout.ensure_overview()?;

        let records = self.source.full_catalog().await?;
        let mut report = CatalogReport {
            listed: records.len(),
            ..Default::default()
        };
        tracing::info!("Catalog lists {} acts, starting at index {}", records.len(), offset);

        for (index, record) in records.into_iter().enumerate() {
            if index < offset {
                report.skipped_by_offset += 1;
                continue;
            }

            match self.process(index, record).await {
                Ok((name, entry)) => {
                    tracing::info!("Stored {} ({})", name, entry.status);
                    self.entries.insert(name, entry);
                    report.stored += 1;
                }
                Err(e) => {
                    tracing::warn!("Catalog record {} failed: {}", index, e);
                    report.failed += 1;
                }
            }

            let handled = report.stored + report.failed;
            if handled % self.snapshot_interval == 0 {
                self.save()?;
                report.snapshots += 1;
            }
        }

        self.save()?;
        report.snapshots += 1;

        tracing::info!(
            "Catalog finished: {} stored, {} failed in {:?}",
            report.stored,
            report.failed,
            start.elapsed()
        );

        Ok(report)
    }

    async fn process(
        &self,
        index: usize,
        record: CitationRecord,
    ) -> Result<(String, CatalogEntry), CrawlError> {
        let resource_uri = record
            .get("sr_uri")
            .cloned()
            .ok_or(CatalogError::MissingField {
                index,
                field: "sr_uri",
            })?;

        if let Some(title) = record.get("titel") {
            tracing::debug!("Crawling {}", title);
        }

        let escalation = self.escalator.escalate(&website_uri(&resource_uri)).await?;
        let document = fetch_with_retry(self.fetcher.as_ref(), &escalation.resolved_url, self.retry).await?;

        let name = format!("legal_doc_{}.xml", index);
        let storage_location = self.layout.location(ResourceKind::Legal, &name);
        if self.write {
            self.layout.write(&storage_location, &document.body).await?;
        }

        let citing = self.source.citing(&resource_uri).await.unwrap_or_else(|e| {
            tracing::warn!("No citing acts for {}: {}", resource_uri, e);
            Vec::new()
        });
        let cited_by = self.source.cited_by(&resource_uri).await.unwrap_or_else(|e| {
            tracing::warn!("No cited acts for {}: {}", resource_uri, e);
            Vec::new()
        });

        let entry = CatalogEntry {
            record,
            status: escalation.status,
            resolved_url: escalation.resolved_url,
            storage_location,
            fingerprint: text_fingerprint(&document.text()),
            citing,
            cited_by,
        };

        Ok((name, entry))
    }

    /// Writes the catalog snapshot as JSON
    pub fn save(&self) -> Result<(), CatalogError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(self.layout.catalog_path(), json)?;
        tracing::debug!("Saved catalog snapshot with {} entries", self.entries.len());
        Ok(())
    }

    /// Reads a catalog snapshot
    pub fn load(layout: &OutputLayout) -> Result<BTreeMap<String, CatalogEntry>, CatalogError> {
        let json = std::fs::read_to_string(layout.catalog_path())?;
        Ok(serde_json::from_str(&json)?)
    }
}
