//! docharvest: a polite, resumable documentation crawler
//!
//! This crate renders documentation websites (including single-page
//! applications) in a headless browser, follows in-scope links breadth-first,
//! and converts each page's main content into a normalized Markdown document
//! written one file per source URL.

pub mod config;
pub mod content;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for docharvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Browser engine error: {0}")]
    Engine(String),

    #[error("Invalid state transition for {url}: {from} -> {to}")]
    InvalidTransition {
        url: String,
        from: state::UrlStatus,
        to: state::UrlStatus,
    },

    #[error("Invalid run transition: {from:?} -> {to:?}")]
    InvalidRunTransition {
        from: state::RunState,
        to: state::RunState,
    },

    #[error("Unknown URL in frontier: {0}")]
    UnknownUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid host pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid CSS selector '{0}'")]
    InvalidSelector(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for docharvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, CrawlSettings};
pub use content::{HtmlNormalizer, NormalizationError, PageDocument};
pub use crawler::{Coordinator, FetchError, Frontier, PageEngine, StartMode};
pub use state::{ErrorKind, RunState, UrlRecord, UrlStatus};
pub use url::{normalize_url, UrlScope};
