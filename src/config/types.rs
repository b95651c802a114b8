use serde::{Deserialize, Serialize};

/// Main configuration structure for docharvest
///
/// Every section is optional in the TOML file; missing keys take their
/// defaults. The crawl root may also come from the command line.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawl traversal and politeness configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlConfig {
    /// Root URL of the documentation tree
    #[serde(rename = "root-url", skip_serializing_if = "Option::is_none")]
    pub root_url: Option<String>,

    /// Maximum link distance from the root
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum number of pages to save (0 = unlimited)
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Maximum number of concurrent page fetches
    #[serde(rename = "concurrency-limit")]
    pub concurrency_limit: u32,

    /// Minimum time between request starts to the same host (milliseconds)
    #[serde(rename = "request-delay-ms")]
    pub request_delay_ms: u64,

    /// How long in-flight fetches may finish after cancellation (milliseconds)
    #[serde(rename = "cancel-grace-ms")]
    pub cancel_grace_ms: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            root_url: None,
            max_depth: 3,
            max_pages: 100,
            concurrency_limit: 4,
            request_delay_ms: 500,
            cancel_grace_ms: 5000,
        }
    }
}

/// Which URLs beyond the root's host and path prefix are in scope
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScopeConfig {
    /// Sibling host patterns (e.g., "docs.example.com" or "*.example.com")
    #[serde(rename = "extra-hosts")]
    pub extra_hosts: Vec<String>,

    /// Path prefixes that are never crawled
    #[serde(rename = "exclude-paths")]
    pub exclude_paths: Vec<String>,

    /// File extensions to skip; replaces the built-in list when set
    #[serde(rename = "skip-extensions", skip_serializing_if = "Option::is_none")]
    pub skip_extensions: Option<Vec<String>>,
}

/// When a rendered page is considered settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitKind {
    NetworkIdle,
    DomReady,
    Selector,
    Fixed,
}

impl std::str::FromStr for WaitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "network-idle" => Ok(Self::NetworkIdle),
            "dom-ready" => Ok(Self::DomReady),
            "selector" => Ok(Self::Selector),
            "fixed" => Ok(Self::Fixed),
            other => Err(format!(
                "unknown wait policy '{}' (expected network-idle, dom-ready, selector or fixed)",
                other
            )),
        }
    }
}

/// Browser and render-wait configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub wait: WaitKind,

    /// CSS selector awaited by the `selector` policy
    #[serde(rename = "wait-selector", skip_serializing_if = "Option::is_none")]
    pub wait_selector: Option<String>,

    /// Quiet period for the `network-idle` policy (milliseconds)
    #[serde(rename = "idle-ms")]
    pub idle_ms: u64,

    /// Sleep after load for the `fixed` policy (milliseconds)
    #[serde(rename = "fixed-wait-ms")]
    pub fixed_wait_ms: u64,

    /// Upper bound for navigation plus readiness (milliseconds)
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    pub headless: bool,

    /// Chrome/Chromium binary; auto-detected when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,

    /// DevTools HTTP endpoint of an already running browser
    #[serde(rename = "browser-url", skip_serializing_if = "Option::is_none")]
    pub browser_url: Option<String>,

    #[serde(rename = "viewport-width")]
    pub viewport_width: u32,

    #[serde(rename = "viewport-height")]
    pub viewport_height: u32,

    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            wait: WaitKind::NetworkIdle,
            wait_selector: None,
            idle_ms: 500,
            fixed_wait_ms: 2000,
            timeout_ms: 30_000,
            headless: true,
            executable: None,
            browser_url: None,
            viewport_width: 1280,
            viewport_height: 800,
            user_agent: "Mozilla/5.0 Documentation Browser Crawler".to_string(),
        }
    }
}

/// Retry behaviour for transient fetch failures
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts per URL, including the first
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Base backoff, doubled after every failed attempt (milliseconds)
    #[serde(rename = "backoff-ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 1000,
        }
    }
}

/// Main-content location and chrome stripping
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContentConfig {
    /// CSS selectors tried first, in order, to find the content region
    pub selectors: Vec<String>,

    /// CSS selectors whose matches are dropped from the content
    #[serde(rename = "exclude-selectors")]
    pub exclude_selectors: Vec<String>,

    /// Minimum text length for a semantic region to be accepted
    #[serde(rename = "min-content-chars")]
    pub min_content_chars: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            selectors: Vec::new(),
            exclude_selectors: Vec::new(),
            min_content_chars: 100,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory receiving one Markdown file per page
    pub directory: String,

    /// Path to the SQLite ledger; `<directory>/.docharvest.db` when unset
    #[serde(rename = "ledger-path", skip_serializing_if = "Option::is_none")]
    pub ledger_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "./data/docs".to_string(),
            ledger_path: None,
        }
    }
}
