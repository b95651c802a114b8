//! Resolved, immutable settings for one crawl run
//!
//! `Config` mirrors the TOML file; `CrawlSettings` is what the crawler
//! actually consumes. It is built once, validated, and shared behind an
//! `Arc` for the duration of the run.

use crate::config::types::{Config, WaitKind};
use crate::config::validation::validate;
use crate::url::{normalize_url, strip_fragment, UrlScope};
use crate::{ConfigError, ConfigResult};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// File name of the ledger inside the output directory
pub const DEFAULT_LEDGER_FILE: &str = ".docharvest.db";

/// Rule deciding when a rendered page is settled enough to scrape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderWaitPolicy {
    /// The document is complete and the number of loaded resources has not
    /// changed for `idle`
    NetworkIdle { idle: Duration },

    /// `document.readyState == "complete"`
    DomReady,

    /// The CSS selector matches at least one element
    Selector(String),

    /// Sleep a fixed delay after load
    Fixed(Duration),
}

impl RenderWaitPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NetworkIdle { .. } => "network-idle",
            Self::DomReady => "dom-ready",
            Self::Selector(_) => "selector",
            Self::Fixed(_) => "fixed",
        }
    }
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; 1 disables retries
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Delay before attempt number `attempt + 1`, given `attempt` failures so far
    ///
    /// The first retry waits `backoff`, each further retry doubles it.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1u32 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single_attempt()
    }
}

/// How the browser engine is obtained and configured
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub executable: Option<PathBuf>,

    /// Attach to this DevTools HTTP endpoint instead of launching a browser
    pub remote_url: Option<String>,
    pub viewport: (u32, u32),
    pub user_agent: String,
}

/// Content region location and chrome stripping
#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub selectors: Vec<String>,
    pub exclude_selectors: Vec<String>,
    pub min_content_chars: usize,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            selectors: Vec::new(),
            exclude_selectors: Vec::new(),
            min_content_chars: 100,
        }
    }
}

/// Crawl configuration for one run
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Normalized crawl root, the key the root is recorded under
    pub root_url: Url,

    /// The root as given, minus any fragment; this is what gets requested
    pub root_fetch_url: Url,
    pub max_depth: u32,

    /// None means unlimited
    pub max_pages: Option<u32>,
    pub concurrency_limit: usize,
    pub request_delay: Duration,
    pub cancel_grace: Duration,
    pub render_wait: RenderWaitPolicy,
    pub readiness_timeout: Duration,
    pub retry: RetryPolicy,
    pub scope: UrlScope,
    pub content: ContentSettings,
    pub browser: BrowserOptions,
    pub output_dir: PathBuf,
    pub ledger_path: PathBuf,
}

impl CrawlSettings {
    /// Settings for a root URL with every other value at its default
    pub fn for_root(root_url: &str) -> ConfigResult<Self> {
        let mut config = Config::default();
        config.crawl.root_url = Some(root_url.to_string());
        config.crawl_settings()
    }
}

impl Config {
    /// Validates the configuration and resolves it into run settings
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSettings)` - Settings ready to hand to the coordinator
    /// * `Err(ConfigError)` - The configuration is invalid or has no root URL
    pub fn crawl_settings(&self) -> ConfigResult<CrawlSettings> {
        validate(self)?;

        let raw_root = self.crawl.root_url.as_deref().ok_or_else(|| {
            ConfigError::Validation(
                "a root URL is required ([crawl] root-url or --url)".to_string(),
            )
        })?;
        let root_url = normalize_url(raw_root)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid root URL '{}': {}", raw_root, e)))?;
        let root_fetch_url = Url::parse(raw_root.trim())
            .map(|url| strip_fragment(&url))
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid root URL '{}': {}", raw_root, e)))?;

        let mut scope = UrlScope::from_root(&root_url)
            .map_err(|e| ConfigError::InvalidUrl(e.to_string()))?
            .with_extra_hosts(self.scope.extra_hosts.clone())
            .with_excluded_paths(self.scope.exclude_paths.clone());
        if let Some(extensions) = &self.scope.skip_extensions {
            scope = scope.with_skip_extensions(extensions.clone());
        }

        let render_wait = match self.render.wait {
            WaitKind::NetworkIdle => RenderWaitPolicy::NetworkIdle {
                idle: Duration::from_millis(self.render.idle_ms),
            },
            WaitKind::DomReady => RenderWaitPolicy::DomReady,
            WaitKind::Selector => {
                // validate() guarantees the selector is present
                let selector = self.render.wait_selector.clone().unwrap_or_default();
                RenderWaitPolicy::Selector(selector)
            }
            WaitKind::Fixed => {
                RenderWaitPolicy::Fixed(Duration::from_millis(self.render.fixed_wait_ms))
            }
        };

        let output_dir = PathBuf::from(&self.output.directory);
        let ledger_path = match &self.output.ledger_path {
            Some(path) => PathBuf::from(path),
            None => output_dir.join(DEFAULT_LEDGER_FILE),
        };

        Ok(CrawlSettings {
            root_url,
            root_fetch_url,
            max_depth: self.crawl.max_depth,
            max_pages: match self.crawl.max_pages {
                0 => None,
                n => Some(n),
            },
            concurrency_limit: self.crawl.concurrency_limit as usize,
            request_delay: Duration::from_millis(self.crawl.request_delay_ms),
            cancel_grace: Duration::from_millis(self.crawl.cancel_grace_ms),
            render_wait,
            readiness_timeout: Duration::from_millis(self.render.timeout_ms),
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                backoff: Duration::from_millis(self.retry.backoff_ms),
            },
            scope,
            content: ContentSettings {
                selectors: self.content.selectors.clone(),
                exclude_selectors: self.content.exclude_selectors.clone(),
                min_content_chars: self.content.min_content_chars,
            },
            browser: BrowserOptions {
                headless: self.render.headless,
                executable: self.render.executable.as_ref().map(PathBuf::from),
                remote_url: self.render.browser_url.clone(),
                viewport: (self.render.viewport_width, self.render.viewport_height),
                user_agent: self.render.user_agent.clone(),
            },
            output_dir,
            ledger_path,
        })
    }
}
