//! SQLite checkpoint backend
//!
//! This module provides a SQLite-based implementation of the Checkpoint trait.

use crate::crawler::FrontierSnapshot;
use crate::legal::{EscalationResult, LegalStatus};
use crate::resource::ResourceKind;
use crate::storage::schema::{initialize_schema, SNAPSHOT_TABLES};
use crate::storage::traits::{Checkpoint, StorageError, StorageResult};
use crate::storage::{CheckpointState, CrawlEntry, KnowledgeStore, SkipRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const STATE_PENDING: &str = "pending";
const STATE_DONE: &str = "done";

const META_LEGAL_COUNTER: &str = "legal_counter";
const META_CHECKPOINTED_AT: &str = "checkpointed_at";

/// SQLite checkpoint file
pub struct SqliteCheckpoint {
    conn: Connection,
}

impl SqliteCheckpoint {
    /// Opens or creates the checkpoint database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteCheckpoint)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn read_meta(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn read_entries(&self) -> StorageResult<BTreeMap<String, CrawlEntry>> {
        let mut links: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut stmt = self
            .conn
            .prepare("SELECT url, target FROM entry_links ORDER BY url, position")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get(1)?)))?;
        for row in rows {
            let (url, target) = row?;
            links.entry(url).or_default().push(target);
        }

        let mut stmt = self.conn.prepare(
            "SELECT url, kind, storage_location, fingerprint, resolved_url, legal_status,
             final_uri, publication_date FROM entries",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
            ))
        })?;

        let mut entries = BTreeMap::new();
        for row in rows {
            let (url, kind, location, fingerprint, resolved, status, final_uri, date) = row?;

            let kind = ResourceKind::from_bucket(&kind)
                .ok_or_else(|| StorageError::Corrupt(format!("unknown kind {:?} for {}", kind, url)))?;

            let escalation = match (resolved, status, final_uri) {
                (Some(resolved_url), Some(status), Some(final_uri)) => Some(EscalationResult {
                    resolved_url,
                    status: LegalStatus::from_db_string(&status).ok_or_else(|| {
                        StorageError::Corrupt(format!("unknown status {:?} for {}", status, url))
                    })?,
                    final_uri,
                    publication_date: date,
                }),
                (None, None, None) => None,
                _ => {
                    return Err(StorageError::Corrupt(format!(
                        "incomplete escalation for {}",
                        url
                    )))
                }
            };

            let outbound_links = links.remove(&url).unwrap_or_default();
            entries.insert(
                url,
                CrawlEntry {
                    kind,
                    storage_location: PathBuf::from(location),
                    fingerprint,
                    outbound_links,
                    escalation,
                },
            );
        }

        Ok(entries)
    }

    fn read_skipped(&self) -> StorageResult<BTreeMap<String, SkipRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url, reason, attempts, skipped_at FROM skipped")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut skipped = BTreeMap::new();
        for row in rows {
            let (url, reason, attempts, skipped_at) = row?;
            skipped.insert(
                url,
                SkipRecord {
                    reason,
                    attempts,
                    skipped_at: parse_timestamp(&skipped_at)?,
                },
            );
        }
        Ok(skipped)
    }

    fn read_frontier(&self) -> StorageResult<FrontierSnapshot> {
        let mut stmt = self
            .conn
            .prepare("SELECT url FROM frontier WHERE state = ?1 ORDER BY position")?;

        let pending = stmt
            .query_map(params![STATE_PENDING], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        let done = stmt
            .query_map(params![STATE_DONE], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(FrontierSnapshot { pending, done })
    }
}

impl Checkpoint for SqliteCheckpoint {
    fn save(&mut self, state: &CheckpointState) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        for table in SNAPSHOT_TABLES {
            tx.execute(&format!("DELETE FROM {}", table), [])?;
        }

        {
            let mut insert_entry = tx.prepare(
                "INSERT INTO entries (url, kind, storage_location, fingerprint, resolved_url,
                 legal_status, final_uri, publication_date) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            let mut insert_link =
                tx.prepare("INSERT INTO entry_links (url, position, target) VALUES (?1, ?2, ?3)")?;

            for (url, entry) in state.store.entries() {
                let location = entry.storage_location.to_str().ok_or_else(|| {
                    StorageError::Serialization(format!(
                        "storage location of {} is not valid UTF-8",
                        url
                    ))
                })?;
                let escalation = entry.escalation.as_ref();

                insert_entry.execute(params![
                    url,
                    entry.kind.bucket(),
                    location,
                    entry.fingerprint,
                    escalation.map(|e| e.resolved_url.as_str()),
                    escalation.map(|e| e.status.as_str()),
                    escalation.map(|e| e.final_uri.as_str()),
                    escalation.and_then(|e| e.publication_date.as_deref()),
                ])?;

                for (position, target) in entry.outbound_links.iter().enumerate() {
                    insert_link.execute(params![url, position as i64, target])?;
                }
            }

            let mut insert_skip = tx.prepare(
                "INSERT INTO skipped (url, reason, attempts, skipped_at) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (url, skip) in state.store.skipped() {
                insert_skip.execute(params![
                    url,
                    skip.reason,
                    skip.attempts,
                    skip.skipped_at.to_rfc3339()
                ])?;
            }

            let mut insert_frontier =
                tx.prepare("INSERT INTO frontier (url, state, position) VALUES (?1, ?2, ?3)")?;
            for (position, url) in state.frontier.pending.iter().enumerate() {
                insert_frontier.execute(params![url, STATE_PENDING, position as i64])?;
            }
            for (position, url) in state.frontier.done.iter().enumerate() {
                insert_frontier.execute(params![url, STATE_DONE, position as i64])?;
            }

            let mut insert_meta = tx.prepare("INSERT INTO meta (key, value) VALUES (?1, ?2)")?;
            insert_meta.execute(params![META_LEGAL_COUNTER, state.legal_counter.to_string()])?;
            insert_meta.execute(params![
                META_CHECKPOINTED_AT,
                state.checkpointed_at.to_rfc3339()
            ])?;
        }

        tx.commit()?;
        Ok(())
    }

    fn load(&self) -> StorageResult<Option<CheckpointState>> {
        let checkpointed_at = match self.read_meta(META_CHECKPOINTED_AT)? {
            Some(value) => parse_timestamp(&value)?,
            None => return Ok(None),
        };

        let legal_counter = match self.read_meta(META_LEGAL_COUNTER)? {
            Some(value) => value
                .parse()
                .map_err(|_| StorageError::Corrupt(format!("legal counter {:?}", value)))?,
            None => 0,
        };

        let store = KnowledgeStore::from_parts(self.read_entries()?, self.read_skipped()?);

        Ok(Some(CheckpointState {
            store,
            frontier: self.read_frontier()?,
            legal_counter,
            checkpointed_at,
        }))
    }
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("timestamp {:?}: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_state() -> CheckpointState {
        let mut store = KnowledgeStore::new();
        store.record(
            "https://www.astra.admin.ch/astra/de/home.html",
            CrawlEntry {
                kind: ResourceKind::Html,
                storage_location: PathBuf::from("crawled_data/html/home.html"),
                fingerprint: "ab12".to_string(),
                outbound_links: vec![
                    "https://www.astra.admin.ch/astra/de/b.html".to_string(),
                    "https://www.astra.admin.ch/astra/de/a.html".to_string(),
                    "https://www.astra.admin.ch/astra/de/b.html".to_string(),
                ],
                escalation: None,
            },
        );
        store.record(
            "https://www.fedlex.admin.ch/eli/cc/1959/679_705_685/de",
            CrawlEntry {
                kind: ResourceKind::Legal,
                storage_location: PathBuf::from("crawled_data/legal/crawled_legaldoc_0.xml"),
                fingerprint: "cd34".to_string(),
                outbound_links: vec!["https://www.fedlex.admin.ch/eli/cc/1959/679_705_685/de".to_string()],
                escalation: Some(EscalationResult {
                    resolved_url: "https://www.fedlex.admin.ch/filestore/svg.xml".to_string(),
                    status: LegalStatus::InForce,
                    final_uri: "https://www.fedlex.admin.ch/eli/cc/1959/679_705_685/de".to_string(),
                    publication_date: Some("01.01.2024".to_string()),
                }),
            },
        );
        store.record(
            "https://www.fedlex.admin.ch/eli/cc/1999/1",
            CrawlEntry {
                kind: ResourceKind::Other,
                storage_location: PathBuf::from("crawled_data/else/crawled_legaldoc_1"),
                fingerprint: "ef56".to_string(),
                outbound_links: vec![],
                escalation: Some(EscalationResult {
                    resolved_url: "https://www.fedlex.admin.ch/eli/cc/1999/1".to_string(),
                    status: LegalStatus::NotInForce,
                    final_uri: "https://www.fedlex.admin.ch/eli/cc/1999/1/de".to_string(),
                    publication_date: None,
                }),
            },
        );
        store.record_skip(
            "https://www.astra.admin.ch/astra/de/broken.pdf",
            SkipRecord::new("connection refused", 2),
        );

        CheckpointState {
            store,
            frontier: FrontierSnapshot {
                pending: vec![
                    "https://www.astra.admin.ch/astra/de/z.html".to_string(),
                    "https://www.astra.admin.ch/astra/de/a.html".to_string(),
                ],
                done: vec!["https://www.astra.admin.ch/astra/de/home.html".to_string()],
            },
            legal_counter: 2,
            checkpointed_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_database_has_no_checkpoint() {
        let checkpoint = SqliteCheckpoint::new_in_memory().unwrap();
        assert!(checkpoint.load().unwrap().is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut checkpoint = SqliteCheckpoint::new_in_memory().unwrap();
        let state = sample_state();

        checkpoint.save(&state).unwrap();
        let loaded = checkpoint.load().unwrap().unwrap();

        assert_eq!(loaded, state);
        // Pending order survives
        assert_eq!(
            loaded.frontier.pending[0],
            "https://www.astra.admin.ch/astra/de/z.html"
        );
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let mut checkpoint = SqliteCheckpoint::new_in_memory().unwrap();
        checkpoint.save(&sample_state()).unwrap();

        let smaller = CheckpointState {
            store: KnowledgeStore::new(),
            frontier: FrontierSnapshot::default(),
            legal_counter: 7,
            checkpointed_at: Utc::now(),
        };
        checkpoint.save(&smaller).unwrap();

        assert_eq!(checkpoint.load().unwrap().unwrap(), smaller);
    }

    #[test]
    fn test_checkpoint_file_reopens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("knowledge_base.sqlite");
        let state = sample_state();

        SqliteCheckpoint::open(&path).unwrap().save(&state).unwrap();

        let reopened = SqliteCheckpoint::open(&path).unwrap();
        assert_eq!(reopened.load().unwrap().unwrap(), state);
    }
}
