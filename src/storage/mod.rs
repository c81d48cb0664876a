//! Knowledge store and checkpoint persistence
//!
//! This module handles the durable side of a crawl:
//! - The in-memory URL → entry mapping built by the engine
//! - Skipped URLs with the reason they were given up on
//! - SQLite checkpoints of the store, the frontier and engine counters

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteCheckpoint;
pub use traits::{Checkpoint, StorageError, StorageResult};

use crate::crawler::FrontierSnapshot;
use crate::legal::EscalationResult;
use crate::resource::ResourceKind;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Opens or creates the checkpoint database at `path`
pub fn open_checkpoint(path: &Path) -> StorageResult<SqliteCheckpoint> {
    SqliteCheckpoint::open(path)
}

/// Reads the checkpoint at `path`, if one was written
///
/// A missing file is not an error.
pub fn load_checkpoint(path: &Path) -> StorageResult<Option<CheckpointState>> {
    if !path.exists() {
        return Ok(None);
    }
    open_checkpoint(path)?.load()
}

/// Knowledge store record of one processed URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlEntry {
    pub kind: ResourceKind,

    /// Where the body is (or would be) written
    pub storage_location: PathBuf,

    pub fingerprint: String,

    /// Links found on the page, in document order; for resolved legal
    /// documents the final browser URL
    pub outbound_links: Vec<String>,

    /// Present for gated pages that were escalated successfully
    pub escalation: Option<EscalationResult>,
}

/// A URL the engine gave up on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipRecord {
    pub reason: String,

    /// Failed fetch attempts; zero when the URL was given up on for another reason
    pub attempts: u32,

    pub skipped_at: DateTime<Utc>,
}

impl SkipRecord {
    pub fn new(reason: impl Into<String>, attempts: u32) -> Self {
        Self {
            reason: reason.into(),
            attempts,
            skipped_at: Utc::now(),
        }
    }
}

/// In-memory mapping of processed and skipped URLs
///
/// Owned by the coordinating task of the engine, so writes are serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeStore {
    entries: BTreeMap<String, CrawlEntry>,
    skipped: BTreeMap<String, SkipRecord>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        entries: BTreeMap<String, CrawlEntry>,
        skipped: BTreeMap<String, SkipRecord>,
    ) -> Self {
        Self { entries, skipped }
    }

    /// Upserts the entry of `url`, returning the replaced one
    pub fn record(&mut self, url: impl Into<String>, entry: CrawlEntry) -> Option<CrawlEntry> {
        let url = url.into();
        let previous = self.entries.insert(url.clone(), entry);
        if previous.is_some() {
            tracing::debug!("Replaced knowledge store entry for {}", url);
        }
        previous
    }

    /// Records that `url` was given up on
    pub fn record_skip(&mut self, url: impl Into<String>, skip: SkipRecord) {
        self.skipped.insert(url.into(), skip);
    }

    pub fn get(&self, url: &str) -> Option<&CrawlEntry> {
        self.entries.get(url)
    }

    pub fn get_skip(&self, url: &str) -> Option<&SkipRecord> {
        self.skipped.get(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn is_skipped(&self, url: &str) -> bool {
        self.skipped.contains_key(url)
    }

    /// Number of recorded entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn skipped_len(&self) -> usize {
        self.skipped.len()
    }

    /// Entries ordered by URL
    pub fn entries(&self) -> impl Iterator<Item = (&String, &CrawlEntry)> {
        self.entries.iter()
    }

    /// Skipped URLs ordered by URL
    pub fn skipped(&self) -> impl Iterator<Item = (&String, &SkipRecord)> {
        self.skipped.iter()
    }

    /// Number of entries per resource kind
    pub fn count_by_kind(&self) -> BTreeMap<ResourceKind, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.entries.values() {
            *counts.entry(entry.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Number of entries carrying an escalation result
    pub fn escalated_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.escalation.is_some())
            .count()
    }

    /// Total number of outbound links over all entries
    pub fn link_count(&self) -> usize {
        self.entries.values().map(|entry| entry.outbound_links.len()).sum()
    }
}

/// Everything a checkpoint persists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointState {
    pub store: KnowledgeStore,
    pub frontier: FrontierSnapshot,

    /// Next number for `crawled_legaldoc_<n>`
    pub legal_counter: u64,

    pub checkpointed_at: DateTime<Utc>,
}
