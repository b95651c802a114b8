//! Storage module for the crawl ledger
//!
//! This module persists crawl progress, including:
//! - SQLite database initialization and schema management
//! - URL record persistence, mirrored on every state change
//! - Run tracking and resumption support

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::RunState;
use std::path::Path;

/// Opens (creating if needed) the ledger at `path`
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully opened ledger
/// * `Err(StorageError)` - Failed to open or initialize it
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Represents a crawl run
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: i64,
    pub root_url: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunState,
}

impl RunRecord {
    /// A run still marked `running` was interrupted before it could finish
    pub fn was_interrupted(&self) -> bool {
        self.status == RunState::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_was_interrupted() {
        let mut run = RunRecord {
            id: 1,
            root_url: "https://example.com/docs".to_string(),
            started_at: "2024-01-01T00:00:00Z".to_string(),
            finished_at: None,
            config_hash: "abc".to_string(),
            status: RunState::Running,
        };
        assert!(run.was_interrupted());

        run.status = RunState::Aborted;
        assert!(!run.was_interrupted());
    }
}
