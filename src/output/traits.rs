//! Page sink trait and crawl report types
//!
//! This module defines the interface through which page documents leave
//! the crawler, and the report produced at the end of a run.

use crate::content::PageDocument;
use crate::state::{ErrorKind, RunState, StatusCounts};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// A URL that ended up failed, with its classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedUrl {
    pub url: String,
    pub kind: ErrorKind,
    pub message: String,
    pub depth: u32,
}

/// What a crawl run did
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub root_url: String,
    pub outcome: RunState,

    /// Ledger run ID, when a ledger was used
    pub run_id: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_seconds: f64,

    /// Record counts at the end of the run (in-flight records of an
    /// aborted run stay in-flight)
    pub counts: StatusCounts,
    pub documents_written: u64,

    /// URLs that finished `done`, in completion order
    pub visited_urls: Vec<String>,
    pub failed_urls: Vec<FailedUrl>,

    /// Why the run was aborted
    pub abort_reason: Option<String>,
}

impl CrawlReport {
    /// Returns the share of finished URLs that succeeded, as a percentage
    pub fn success_rate(&self) -> f64 {
        let finished = self.counts.done + self.counts.failed;
        if finished == 0 {
            return 0.0;
        }
        (self.counts.done as f64 / finished as f64) * 100.0
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == RunState::Completed
    }
}

/// Destination for page documents
///
/// The coordinator calls [`persist`](PageSink::persist) once per
/// successfully normalized URL, in completion order, and
/// [`finalize`](PageSink::finalize) once when the run ends.
pub trait PageSink: Send {
    /// Writes one document
    fn persist(&mut self, document: &PageDocument) -> OutputResult<()>;

    /// Called with the final report once the run is over
    fn finalize(&mut self, _report: &CrawlReport) -> OutputResult<()> {
        Ok(())
    }
}
