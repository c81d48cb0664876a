//! Statistics of a crawl checkpoint
//!
//! This module extracts and displays crawl statistics from a checkpoint
//! without starting a crawl.

use crate::resource::ResourceKind;
use crate::storage::{load_checkpoint, CheckpointState, StorageResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;

/// Crawl statistics summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// Number of processed URLs
    pub total_entries: usize,

    /// Count of entries by resource kind
    pub entries_by_kind: BTreeMap<ResourceKind, usize>,

    /// Entries resolved through the escalator
    pub escalated: usize,

    /// Outbound links over all entries
    pub total_links: usize,

    /// URLs given up on, with their reason
    pub skipped: Vec<(String, String)>,

    pub pending: usize,
    pub done: usize,
    pub legal_documents: u64,
    pub checkpointed_at: DateTime<Utc>,
}

impl CrawlStatistics {
    pub fn from_state(state: &CheckpointState) -> Self {
        Self {
            total_entries: state.store.len(),
            entries_by_kind: state.store.count_by_kind(),
            escalated: state.store.escalated_count(),
            total_links: state.store.link_count(),
            skipped: state
                .store
                .skipped()
                .map(|(url, skip)| (url.clone(), skip.reason.clone()))
                .collect(),
            pending: state.frontier.pending.len(),
            done: state.frontier.done.len(),
            legal_documents: state.legal_counter,
            checkpointed_at: state.checkpointed_at,
        }
    }
}

/// Loads statistics from the checkpoint at `path`
///
/// # Returns
///
/// * `Ok(Some(CrawlStatistics))` - A checkpoint was found
/// * `Ok(None)` - No checkpoint exists yet
/// * `Err(StorageError)` - The checkpoint could not be read
pub fn load_statistics(path: &Path) -> StorageResult<Option<CrawlStatistics>> {
    Ok(load_checkpoint(path)?.map(|state| CrawlStatistics::from_state(&state)))
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Checkpoint written: {}", stats.checkpointed_at.to_rfc3339());
    println!("  Processed URLs: {}", stats.total_entries);
    println!("  Escalated legal pages: {}", stats.escalated);
    println!("  Legal documents numbered: {}", stats.legal_documents);
    println!("  Total links found: {}", stats.total_links);
    println!();

    println!("Frontier:");
    println!("  Done: {}", stats.done);
    println!("  Pending: {}", stats.pending);
    println!();

    println!("Entries by Kind:");
    let mut kind_counts: Vec<_> = stats.entries_by_kind.iter().collect();
    kind_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (kind, count) in kind_counts {
        let percentage = if stats.total_entries > 0 {
            (*count as f64 / stats.total_entries as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", kind, count, percentage);
    }
    println!();

    if !stats.skipped.is_empty() {
        println!("Skipped URLs ({}):", stats.skipped.len());
        for (url, reason) in &stats.skipped {
            println!("  - {} ({})", url, reason);
        }
        println!();
    }

    let handled = stats.total_entries + stats.skipped.len();
    let success_rate = if handled > 0 {
        (stats.total_entries as f64 / handled as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} URLs successfully processed)",
        success_rate, stats.total_entries, handled
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::FrontierSnapshot;
    use crate::storage::{open_checkpoint, Checkpoint, CrawlEntry, KnowledgeStore, SkipRecord};
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_statistics_from_checkpoint() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("knowledge_base.sqlite");

        let mut store = KnowledgeStore::new();
        store.record(
            "https://www.astra.admin.ch/astra/de/home.html",
            CrawlEntry {
                kind: ResourceKind::Html,
                storage_location: PathBuf::from("html/home.html"),
                fingerprint: "aa".to_string(),
                outbound_links: vec!["https://www.astra.admin.ch/astra/de/a.pdf".to_string()],
                escalation: None,
            },
        );
        store.record_skip("https://www.astra.admin.ch/astra/de/a.pdf", SkipRecord::new("timeout", 2));

        let state = CheckpointState {
            store,
            frontier: FrontierSnapshot {
                pending: vec!["https://www.astra.admin.ch/astra/de/b.html".to_string()],
                done: vec![
                    "https://www.astra.admin.ch/astra/de/home.html".to_string(),
                    "https://www.astra.admin.ch/astra/de/a.pdf".to_string(),
                ],
            },
            legal_counter: 0,
            checkpointed_at: Utc::now(),
        };
        open_checkpoint(&path).unwrap().save(&state).unwrap();

        let stats = load_statistics(&path).unwrap().unwrap();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.entries_by_kind[&ResourceKind::Html], 1);
        assert_eq!(stats.total_links, 1);
        assert_eq!(stats.skipped.len(), 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.done, 2);
    }

    #[test]
    fn test_no_checkpoint_no_statistics() {
        let dir = TempDir::new().unwrap();
        assert!(load_statistics(&dir.path().join("none.sqlite")).unwrap().is_none());
    }
}
