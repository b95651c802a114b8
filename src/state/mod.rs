//! State module for tracking crawl progress
//!
//! This module provides state management for URLs, hosts and the crawl run.
//!
//! # Components
//!
//! - `UrlStatus`: the lifecycle of a single URL (pending, in-flight, done, failed)
//! - `UrlRecord`: everything the frontier knows about one discovered URL
//! - `ErrorKind`: the classification stored with a failed URL
//! - `StatusCounts`: per-status totals for reporting
//! - `HostState`: per-host request timing for politeness
//! - `RunState`: the lifecycle of a crawl run

mod host_state;
mod run_state;
mod url_state;

// Re-export main types
pub use host_state::HostState;
pub use run_state::RunState;
pub use url_state::{ErrorKind, StatusCounts, UrlRecord, UrlStatus};
