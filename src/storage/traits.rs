//! Storage traits and error types
//!
//! This module defines the trait interface for ledger backends and
//! associated error types.

use crate::state::{RunState, StatusCounts, UrlRecord, UrlStatus};
use crate::storage::RunRecord;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Corrupt ledger row: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for crawl ledger implementations
///
/// The ledger mirrors every URL record transition so that an interrupted
/// crawl can be resumed and a finished one retried for its failures.
pub trait Storage: Send {
    // ===== Run Management =====

    /// Creates a new run in the `running` state
    ///
    /// # Arguments
    ///
    /// * `root_url` - The normalized crawl root
    /// * `config_hash` - Hash of the effective configuration
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, root_url: &str, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Records the outcome of a run with a finish timestamp
    fn finish_run(&mut self, run_id: i64, outcome: RunState) -> StorageResult<()>;

    // ===== URL Records =====

    /// Inserts a record or updates the stored one with the same key
    ///
    /// The run that first discovered the URL is kept on update.
    fn upsert_url(&mut self, record: &UrlRecord, run_id: i64) -> StorageResult<()>;

    /// Loads every stored record in discovery order
    fn load_urls(&self) -> StorageResult<Vec<UrlRecord>>;

    /// Deletes every URL record (run history is kept)
    fn clear_urls(&mut self) -> StorageResult<()>;

    // ===== Statistics =====

    /// Counts records in the given status
    fn count_urls_by_status(&self, status: UrlStatus) -> StorageResult<u64>;

    /// Counts records in every status
    fn status_counts(&self) -> StorageResult<StatusCounts> {
        let mut counts = StatusCounts::default();
        counts.pending = self.count_urls_by_status(UrlStatus::Pending)?;
        counts.in_flight = self.count_urls_by_status(UrlStatus::InFlight)?;
        counts.done = self.count_urls_by_status(UrlStatus::Done)?;
        counts.failed = self.count_urls_by_status(UrlStatus::Failed)?;
        Ok(counts)
    }

    /// Failed records grouped by error kind
    fn get_error_summary(&self) -> StorageResult<BTreeMap<String, u64>>;

    /// Records grouped by depth
    fn get_depth_breakdown(&self) -> StorageResult<BTreeMap<u32, u64>>;
}
