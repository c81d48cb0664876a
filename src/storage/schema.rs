//! Database schema of the checkpoint file

/// SQL schema for the checkpoint database
pub const SCHEMA_SQL: &str = r#"
-- One row per processed URL
CREATE TABLE IF NOT EXISTS entries (
    url TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    storage_location TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    resolved_url TEXT,
    legal_status TEXT,
    final_uri TEXT,
    publication_date TEXT
);

-- Outbound links of an entry, in extraction order
CREATE TABLE IF NOT EXISTS entry_links (
    url TEXT NOT NULL REFERENCES entries(url) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    target TEXT NOT NULL,
    PRIMARY KEY (url, position)
);

CREATE INDEX IF NOT EXISTS idx_entry_links_target ON entry_links(target);

-- URLs given up on
CREATE TABLE IF NOT EXISTS skipped (
    url TEXT PRIMARY KEY,
    reason TEXT NOT NULL,
    attempts INTEGER NOT NULL,
    skipped_at TEXT NOT NULL
);

-- Frontier snapshot; pending rows keep their dispatch position
CREATE TABLE IF NOT EXISTS frontier (
    url TEXT NOT NULL,
    state TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (state, url)
);

CREATE INDEX IF NOT EXISTS idx_frontier_position ON frontier(state, position);

-- Engine counters and checkpoint metadata
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Tables rewritten by every checkpoint, children first
pub const SNAPSHOT_TABLES: &[&str] = &["entry_links", "entries", "skipped", "frontier", "meta"];

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
