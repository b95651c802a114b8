/// URL state definitions for tracking crawl progress
///
/// This module defines the states a discovered URL moves through and the
/// record the frontier keeps for it.
use serde::{Serialize, Serializer};
use std::fmt;
use url::Url;

/// Represents the current state of a URL in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlStatus {
    /// Discovered and waiting to be fetched
    Pending,

    /// A fetch for this URL is outstanding
    InFlight,

    /// Fetched, normalized and persisted
    Done,

    /// Fetch, normalization or persistence failed
    Failed,
}

impl UrlStatus {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if the transition `self -> next` is allowed
    ///
    /// The only legal path is `pending -> in-flight -> {done, failed}`.
    pub fn can_transition_to(&self, next: UrlStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InFlight)
                | (Self::InFlight, Self::Done)
                | (Self::InFlight, Self::Failed)
        )
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_flight" => Some(Self::InFlight),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all_states() -> Vec<Self> {
        vec![Self::Pending, Self::InFlight, Self::Done, Self::Failed]
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Why a URL ended up failed
///
/// Stored alongside the failure so a retry pass can be scoped to
/// particular kinds of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The render-wait condition was not reached in time
    Timeout,

    /// Connection or navigation failure
    Network,

    /// The main document answered with a non-2xx status
    HttpStatus(u16),

    /// Link extraction failed (never fails a URL on its own)
    Extraction,

    /// No usable content could be converted
    Normalization,

    /// The page document could not be written
    Persistence,

    /// The browser engine went away
    Engine,
}

impl ErrorKind {
    /// Converts the kind to its database string representation
    ///
    /// HTTP status kinds carry their code: `http_status:404`.
    pub fn to_db_string(&self) -> String {
        match self {
            Self::Timeout => "timeout".to_string(),
            Self::Network => "network".to_string(),
            Self::HttpStatus(code) => format!("http_status:{}", code),
            Self::Extraction => "extraction".to_string(),
            Self::Normalization => "normalization".to_string(),
            Self::Persistence => "persistence".to_string(),
            Self::Engine => "engine".to_string(),
        }
    }

    /// Parses a kind from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        if let Some(code) = s.strip_prefix("http_status:") {
            return code.parse().ok().map(Self::HttpStatus);
        }
        match s {
            "timeout" => Some(Self::Timeout),
            "network" => Some(Self::Network),
            "extraction" => Some(Self::Extraction),
            "normalization" => Some(Self::Normalization),
            "persistence" => Some(Self::Persistence),
            "engine" => Some(Self::Engine),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_db_string())
    }
}

/// Number of URL records in each status
///
/// The sum always equals the number of distinct URLs discovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub in_flight: u64,
    pub done: u64,
    pub failed: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.in_flight + self.done + self.failed
    }

    pub fn get(&self, status: UrlStatus) -> u64 {
        match status {
            UrlStatus::Pending => self.pending,
            UrlStatus::InFlight => self.in_flight,
            UrlStatus::Done => self.done,
            UrlStatus::Failed => self.failed,
        }
    }

    /// Increments the counter for `status`
    pub fn add(&mut self, status: UrlStatus) {
        match status {
            UrlStatus::Pending => self.pending += 1,
            UrlStatus::InFlight => self.in_flight += 1,
            UrlStatus::Done => self.done += 1,
            UrlStatus::Failed => self.failed += 1,
        }
    }
}

/// Everything the frontier knows about one discovered URL
///
/// Records are created on first discovery and never deleted. The
/// `discovered_from` back-reference is the normalized key of the page the
/// link was found on, not an owning pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlRecord {
    /// Normalized URL, the dedup key
    pub url: Url,

    /// The URL as first discovered (fragment stripped), used for navigation
    pub fetch_url: Url,

    pub status: UrlStatus,

    /// Link distance from the crawl root (root is 0)
    pub depth: u32,

    /// Normalized URL of the page this one was discovered on
    pub discovered_from: Option<String>,

    /// Discovery order, monotonically increasing
    pub seq: u64,

    /// Number of fetch dispatches so far
    pub attempts: u32,

    /// Failure classification and message when `status` is `Failed`
    pub error: Option<(ErrorKind, String)>,
}

impl UrlRecord {
    /// Creates a pending record
    pub fn new(url: Url, fetch_url: Url, depth: u32, discovered_from: Option<String>, seq: u64) -> Self {
        Self {
            url,
            fetch_url,
            status: UrlStatus::Pending,
            depth,
            discovered_from,
            seq,
            attempts: 0,
            error: None,
        }
    }

    /// The dedup key of this record
    pub fn key(&self) -> &str {
        self.url.as_str()
    }
}
