//! Database schema definitions
//!
//! This module contains the SQL schema of the crawl ledger.

/// SQL schema for the ledger
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    root_url TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- One row per discovered URL, keyed by its normalized form
CREATE TABLE IF NOT EXISTS urls (
    url TEXT PRIMARY KEY,
    fetch_url TEXT NOT NULL,
    status TEXT NOT NULL,
    depth INTEGER NOT NULL,
    discovered_from TEXT,
    seq INTEGER NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    error_kind TEXT,
    error_message TEXT,
    discovered_run INTEGER NOT NULL REFERENCES runs(id),
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_urls_status ON urls(status);
CREATE INDEX IF NOT EXISTS idx_urls_seq ON urls(seq);
"#;

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
