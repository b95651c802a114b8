//! Output module for page documents and crawl summaries
//!
//! This module handles:
//! - Writing one Markdown file per fetched page
//! - Generating JSON and markdown summaries of a run
//! - Reading statistics back from the ledger

mod directory;
mod markdown;
mod memory;
pub mod stats;
mod traits;

pub use directory::{document_path, MarkdownDirSink, SUMMARY_JSON_FILE, SUMMARY_MARKDOWN_FILE};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use memory::MemorySink;
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use traits::{CrawlReport, FailedUrl, OutputError, OutputResult, PageSink};
