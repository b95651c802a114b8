//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{ErrorKind, RunState, UrlRecord, UrlStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::RunRecord;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use url::Url;

/// SQLite ledger backend
pub struct SqliteStorage {
    conn: Connection,
}

/// A `urls` row before its columns are parsed
struct RawUrlRow {
    url: String,
    fetch_url: String,
    status: String,
    depth: u32,
    discovered_from: Option<String>,
    seq: i64,
    attempts: u32,
    error_kind: Option<String>,
    error_message: Option<String>,
}

impl RawUrlRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            url: row.get(0)?,
            fetch_url: row.get(1)?,
            status: row.get(2)?,
            depth: row.get(3)?,
            discovered_from: row.get(4)?,
            seq: row.get(5)?,
            attempts: row.get(6)?,
            error_kind: row.get(7)?,
            error_message: row.get(8)?,
        })
    }

    fn into_record(self) -> StorageResult<UrlRecord> {
        let url = Url::parse(&self.url)
            .map_err(|e| StorageError::Corrupt(format!("url '{}': {}", self.url, e)))?;
        let fetch_url = Url::parse(&self.fetch_url)
            .map_err(|e| StorageError::Corrupt(format!("fetch_url '{}': {}", self.fetch_url, e)))?;
        let status = UrlStatus::from_db_string(&self.status)
            .ok_or_else(|| StorageError::Corrupt(format!("status '{}'", self.status)))?;

        let error = match self.error_kind {
            Some(kind) => {
                let kind = ErrorKind::from_db_string(&kind)
                    .ok_or_else(|| StorageError::Corrupt(format!("error kind '{}'", kind)))?;
                Some((kind, self.error_message.unwrap_or_default()))
            }
            None => None,
        };

        Ok(UrlRecord {
            url,
            fetch_url,
            status,
            depth: self.depth,
            discovered_from: self.discovered_from,
            seq: self.seq.max(0) as u64,
            attempts: self.attempts,
            error,
        })
    }
}

impl SqliteStorage {
    /// Opens or creates the ledger at `path`
    ///
    /// Missing parent directories are created.
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

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

    /// Creates an in-memory ledger
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
        Ok(RunRecord {
            id: row.get(0)?,
            root_url: row.get(1)?,
            started_at: row.get(2)?,
            finished_at: row.get(3)?,
            config_hash: row.get(4)?,
            status: RunState::from_db_string(&row.get::<_, String>(5)?)
                .unwrap_or(RunState::Aborted),
        })
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, root_url: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (root_url, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![root_url, now, config_hash, RunState::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, root_url, started_at, finished_at, config_hash, status
                 FROM runs WHERE id = ?1",
                params![run_id],
                Self::run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, root_url, started_at, finished_at, config_hash, status
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                Self::run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, outcome: RunState) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![outcome.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== URL Records =====

    fn upsert_url(&mut self, record: &UrlRecord, run_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let (error_kind, error_message) = match &record.error {
            Some((kind, message)) => (Some(kind.to_db_string()), Some(message.as_str())),
            None => (None, None),
        };

        self.conn.execute(
            "INSERT INTO urls (url, fetch_url, status, depth, discovered_from, seq, attempts,
                               error_kind, error_message, discovered_run, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(url) DO UPDATE SET
                fetch_url = excluded.fetch_url,
                status = excluded.status,
                depth = excluded.depth,
                discovered_from = excluded.discovered_from,
                seq = excluded.seq,
                attempts = excluded.attempts,
                error_kind = excluded.error_kind,
                error_message = excluded.error_message,
                updated_at = excluded.updated_at",
            params![
                record.url.as_str(),
                record.fetch_url.as_str(),
                record.status.to_db_string(),
                record.depth,
                record.discovered_from,
                record.seq as i64,
                record.attempts,
                error_kind,
                error_message,
                run_id,
                now
            ],
        )?;
        Ok(())
    }

    fn load_urls(&self) -> StorageResult<Vec<UrlRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, fetch_url, status, depth, discovered_from, seq, attempts,
                    error_kind, error_message
             FROM urls ORDER BY seq",
        )?;

        let rows = stmt
            .query_map([], RawUrlRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(RawUrlRow::into_record).collect()
    }

    fn clear_urls(&mut self) -> StorageResult<()> {
        self.conn.execute("DELETE FROM urls", [])?;
        Ok(())
    }

    // ===== Statistics =====

    fn count_urls_by_status(&self, status: UrlStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM urls WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_error_summary(&self) -> StorageResult<BTreeMap<String, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT error_kind, COUNT(*) FROM urls
             WHERE status = ?1 AND error_kind IS NOT NULL
             GROUP BY error_kind",
        )?;

        let rows = stmt.query_map(params![UrlStatus::Failed.to_db_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut summary = BTreeMap::new();
        for row in rows {
            let (kind, count) = row?;
            summary.insert(kind, count as u64);
        }
        Ok(summary)
    }

    fn get_depth_breakdown(&self) -> StorageResult<BTreeMap<u32, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT depth, COUNT(*) FROM urls GROUP BY depth")?;

        let rows = stmt.query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?)))?;

        let mut breakdown = BTreeMap::new();
        for row in rows {
            let (depth, count) = row?;
            breakdown.insert(depth, count as u64);
        }
        Ok(breakdown)
    }
}
