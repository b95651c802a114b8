//! docharvest main entry point
//!
//! This is the command-line interface for the docharvest documentation crawler.

use anyhow::{bail, Context};
use clap::Parser;
use docharvest::config::{compute_config_hash, load_config, Config, CrawlSettings, WaitKind};
use docharvest::crawler::{ChromeEngine, Coordinator, PageEngine, StartMode};
use docharvest::output::{load_statistics, print_statistics, MarkdownDirSink};
use docharvest::state::RunState;
use docharvest::storage::open_storage;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// docharvest: a polite documentation crawler
///
/// docharvest renders a documentation site in a headless browser, follows
/// in-scope links breadth-first, and writes each page's main content as a
/// Markdown file. Progress is kept in a ledger so an interrupted crawl can
/// be resumed.
#[derive(Parser, Debug)]
#[command(name = "docharvest")]
#[command(version)]
#[command(about = "A polite, resumable documentation crawler", long_about = None)]
struct Cli {
    /// Root URL of the documentation tree
    #[arg(long)]
    url: Option<String>,

    /// Output directory for Markdown files and the crawl summary
    #[arg(long)]
    output: Option<PathBuf>,

    /// Maximum link distance from the root URL
    #[arg(long)]
    max_depth: Option<u32>,

    /// Maximum number of pages rendered at once
    #[arg(long)]
    concurrency: Option<u32>,

    /// Path to TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Stop once this many pages have been saved (0 = unlimited)
    #[arg(long)]
    max_pages: Option<u32>,

    /// Render-wait policy: network-idle, dom-ready, selector or fixed
    #[arg(long)]
    wait: Option<WaitKind>,

    /// Minimum delay between requests to the same host, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Attempts per URL for transient failures
    #[arg(long)]
    retries: Option<u32>,

    /// DevTools endpoint of a running browser to use instead of launching one
    #[arg(long)]
    browser_url: Option<String>,

    /// Start a fresh crawl, ignoring previous state
    #[arg(long, conflicts_with_all = ["resume", "retry_failed"])]
    fresh: bool,

    /// Resume an interrupted crawl (default behavior)
    #[arg(long, conflicts_with_all = ["fresh", "retry_failed"])]
    resume: bool,

    /// Resume and fetch previously failed URLs again
    #[arg(long, conflicts_with_all = ["fresh", "resume"])]
    retry_failed: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the ledger and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn start_mode(&self) -> StartMode {
        if self.fresh {
            StartMode::Fresh
        } else if self.retry_failed {
            StartMode::RetryFailed
        } else {
            StartMode::Resume
        }
    }

    /// Applies command-line overrides on top of the file configuration
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.crawl.root_url = Some(url.clone());
        }
        if let Some(output) = &self.output {
            config.output.directory = output.display().to_string();
        }
        if let Some(max_depth) = self.max_depth {
            config.crawl.max_depth = max_depth;
        }
        if let Some(concurrency) = self.concurrency {
            config.crawl.concurrency_limit = concurrency;
        }
        if let Some(max_pages) = self.max_pages {
            config.crawl.max_pages = max_pages;
        }
        if let Some(wait) = self.wait {
            config.render.wait = wait;
        }
        if let Some(delay_ms) = self.delay_ms {
            config.crawl.request_delay_ms = delay_ms;
        }
        if let Some(retries) = self.retries {
            config.retry.max_attempts = retries;
        }
        if let Some(browser_url) = &self.browser_url {
            config.render.browser_url = Some(browser_url.clone());
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        }
        None => Config::default(),
    };
    cli.apply_overrides(&mut config);

    let settings = config
        .crawl_settings()
        .context("Invalid crawl configuration")?;
    let config_hash = compute_config_hash(&config)?;
    tracing::debug!("Configuration hash: {}", config_hash);

    if cli.dry_run {
        handle_dry_run(&settings, cli.start_mode());
        return Ok(());
    }
    if cli.stats {
        return handle_stats(&settings);
    }

    let outcome = handle_crawl(settings, config_hash, cli.start_mode()).await?;
    if outcome == RunState::Aborted {
        bail!("Crawl aborted");
    }
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("docharvest=info,warn"),
            1 => EnvFilter::new("docharvest=debug,info"),
            2 => EnvFilter::new("docharvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the resolved settings
fn handle_dry_run(settings: &CrawlSettings, mode: StartMode) {
    println!("=== docharvest Dry Run ===\n");

    println!("Crawl:");
    println!("  Root URL: {}", settings.root_url);
    println!("  Max depth: {}", settings.max_depth);
    match settings.max_pages {
        Some(max) => println!("  Max pages: {}", max),
        None => println!("  Max pages: unlimited"),
    }
    println!("  Concurrency: {}", settings.concurrency_limit);
    println!("  Per-host delay: {:?}", settings.request_delay);
    println!("  Start mode: {:?}", mode);

    println!("\nScope:");
    println!("  Host: {}", settings.scope.host());
    println!("  Path prefix: {}", settings.scope.path_prefix());

    println!("\nRendering:");
    println!("  Wait policy: {}", settings.render_wait.name());
    println!("  Readiness timeout: {:?}", settings.readiness_timeout);
    println!("  Attempts per URL: {}", settings.retry.max_attempts);
    match &settings.browser.remote_url {
        Some(url) => println!("  Browser: remote at {}", url),
        None => println!(
            "  Browser: launched ({})",
            if settings.browser.headless { "headless" } else { "headed" }
        ),
    }

    println!("\nOutput:");
    println!("  Directory: {}", settings.output_dir.display());
    println!("  Ledger: {}", settings.ledger_path.display());

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the ledger
fn handle_stats(settings: &CrawlSettings) -> anyhow::Result<()> {
    println!("Ledger: {}\n", settings.ledger_path.display());

    if !settings.ledger_path.exists() {
        println!("No ledger found; nothing has been crawled yet.");
        return Ok(());
    }

    let storage = open_storage(&settings.ledger_path)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    settings: CrawlSettings,
    config_hash: String,
    mode: StartMode,
) -> anyhow::Result<RunState> {
    let settings = Arc::new(settings);

    let storage = open_storage(&settings.ledger_path).with_context(|| {
        format!("Failed to open ledger {}", settings.ledger_path.display())
    })?;

    let engine = Arc::new(
        ChromeEngine::start(&settings.browser)
            .await
            .context("Failed to start the browser")?,
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping crawl");
            ctrl_c.cancel();
        }
    });

    let sink = MarkdownDirSink::new(settings.output_dir.clone());
    let mut coordinator = Coordinator::new(settings.clone(), engine.clone(), Box::new(sink))
        .with_storage(Box::new(storage), mode)
        .with_config_hash(config_hash);

    let result = coordinator.run(cancel).await;

    if let Err(e) = engine.shutdown().await {
        tracing::warn!("Browser did not shut down cleanly: {}", e);
    }

    let report = result?;
    println!(
        "{}: {} pages written, {} failed, {} pending ({:.1}s). Summary in {}",
        report.outcome,
        report.documents_written,
        report.counts.failed,
        report.counts.pending,
        report.elapsed_seconds,
        settings.output_dir.display()
    );
    Ok(report.outcome)
}
