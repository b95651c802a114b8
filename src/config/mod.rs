//! Configuration module for docharvest
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and resolving them into the immutable settings of a crawl run.
//!
//! # Example
//!
//! ```no_run
//! use docharvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("docharvest.toml")).unwrap();
//! let settings = config.crawl_settings().unwrap();
//! println!("Crawling {} to depth {}", settings.root_url, settings.max_depth);
//! ```

mod parser;
mod settings;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, ContentConfig, CrawlConfig, OutputConfig, RenderConfig, RetryConfig, ScopeConfig,
    WaitKind,
};

pub use settings::{
    BrowserOptions, ContentSettings, CrawlSettings, RenderWaitPolicy, RetryPolicy,
    DEFAULT_LEDGER_FILE,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
