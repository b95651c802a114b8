//! Crawler module for page rendering and crawl orchestration
//!
//! This module contains the core crawling logic, including:
//! - Rendering pages through a shared browser engine
//! - Fetching with timeouts and retry logic
//! - HTML parsing and link extraction
//! - The breadth-first frontier and per-host pacing
//! - Overall crawl coordination

mod chrome;
mod coordinator;
mod engine;
mod fetcher;
mod frontier;
mod links;
mod politeness;

pub use chrome::{discover_websocket_url, ChromeEngine};
pub use coordinator::Coordinator;
pub use engine::{PageEngine, RenderedPage};
pub use fetcher::{FetchError, Fetcher};
pub use frontier::{Enqueued, Frontier, Redirect, StartMode};
pub use links::{extract_links, try_extract_links, ExtractionError};
pub(crate) use links::document_base;
pub use politeness::Politeness;
