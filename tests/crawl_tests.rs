//! Integration tests for the crawler
//!
//! These tests drive the full crawl cycle against a scripted in-memory site
//! instead of a browser.

use async_trait::async_trait;
use docharvest::config::{CrawlSettings, RenderWaitPolicy};
use docharvest::crawler::{Coordinator, FetchError, PageEngine, RenderedPage, StartMode};
use docharvest::output::{MarkdownDirSink, MemorySink, SUMMARY_JSON_FILE};
use docharvest::state::{ErrorKind, RunState, UrlStatus};
use docharvest::storage::{SqliteStorage, Storage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;

const ROOT: &str = "https://example.com/docs";

/// A scripted documentation site
#[derive(Default)]
struct FakeSite {
    pages: HashMap<String, String>,
    statuses: HashMap<String, u16>,
    redirects: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    crash_on: Option<String>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl FakeSite {
    fn new() -> Self {
        Self::default()
    }

    fn page(mut self, path: &str, links: &[&str]) -> Self {
        self.pages.insert(url_for(path), page_html(path, links));
        self
    }

    fn status(mut self, path: &str, status: u16) -> Self {
        self.statuses.insert(url_for(path), status);
        self
    }

    fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(url_for(from), url_for(to));
        self
    }

    fn delay(mut self, path: &str, delay: Duration) -> Self {
        self.delays.insert(url_for(path), delay);
        self
    }

    fn crash_on(mut self, path: &str) -> Self {
        self.crash_on = Some(url_for(path));
        self
    }

    /// URLs rendered so far, in request order
    fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl PageEngine for FakeSite {
    async fn render(
        &self,
        url: &Url,
        _wait: &RenderWaitPolicy,
    ) -> Result<RenderedPage, FetchError> {
        let requested = url.to_string();
        self.calls
            .lock()
            .unwrap()
            .push((requested.clone(), Instant::now()));

        if self.crash_on.as_deref() == Some(requested.as_str()) {
            return Err(FetchError::Engine("browser process exited".to_string()));
        }
        if let Some(delay) = self.delays.get(&requested) {
            tokio::time::sleep(*delay).await;
        }

        let final_url = self
            .redirects
            .get(&requested)
            .cloned()
            .unwrap_or_else(|| requested.clone());

        let status = self.statuses.get(&final_url).copied().unwrap_or(200);
        let html = match self.pages.get(&final_url) {
            Some(html) => html.clone(),
            None => {
                return Ok(RenderedPage {
                    html: "<html><body><h1>Not Found</h1></body></html>".to_string(),
                    final_url: Url::parse(&final_url).unwrap(),
                    status: Some(404),
                })
            }
        };

        Ok(RenderedPage {
            html,
            final_url: Url::parse(&final_url).unwrap(),
            status: Some(status),
        })
    }
}

fn url_for(path: &str) -> String {
    if path.starts_with("http") {
        path.to_string()
    } else {
        format!("https://example.com{}", path)
    }
}

fn page_html(path: &str, links: &[&str]) -> String {
    let items: String = links
        .iter()
        .map(|href| format!("<li><a href=\"{}\">{}</a></li>", href, href))
        .collect();
    format!(
        "<html><head><title>Page {path}</title></head><body>\
         <nav><a href=\"/docs\">Home</a></nav>\
         <main><h1>Page {path}</h1>\
         <p>This page documents {path} in enough detail to be worth keeping \
         for the ingestion pipeline downstream.</p>\
         <ul>{items}</ul></main>\
         <footer>Copyright</footer></body></html>",
        path = path,
        items = items
    )
}

fn settings(max_depth: u32, concurrency: usize) -> CrawlSettings {
    settings_for(ROOT, max_depth, concurrency)
}

fn settings_for(root: &str, max_depth: u32, concurrency: usize) -> CrawlSettings {
    let mut settings = CrawlSettings::for_root(root).unwrap();
    settings.max_depth = max_depth;
    settings.concurrency_limit = concurrency;
    settings.max_pages = None;
    settings.request_delay = Duration::ZERO;
    settings.cancel_grace = Duration::from_millis(100);
    settings.readiness_timeout = Duration::from_secs(5);
    settings
}

async fn crawl(
    settings: CrawlSettings,
    site: Arc<FakeSite>,
) -> (docharvest::output::CrawlReport, MemorySink) {
    let sink = MemorySink::new();
    let mut coordinator = Coordinator::new(Arc::new(settings), site, Box::new(sink.clone()));
    let report = coordinator.run(CancellationToken::new()).await.unwrap();
    (report, sink)
}

fn markdown_for(sink: &MemorySink, url: &str) -> String {
    sink.documents()
        .iter()
        .find(|doc| doc.source_url.as_str() == url)
        .map(|doc| doc.markdown_body.clone())
        .unwrap_or_else(|| panic!("no document for {}", url))
}

fn documented_urls(sink: &MemorySink) -> Vec<String> {
    let mut urls: Vec<String> = sink
        .documents()
        .iter()
        .map(|doc| doc.source_url.to_string())
        .collect();
    urls.sort();
    urls
}

#[tokio::test]
async fn test_in_scope_links_at_depth_one() {
    let site = Arc::new(
        FakeSite::new()
            .page("/docs", &["/docs/a", "/docs/b", "https://other.com/x"])
            .page("/docs/a", &["/docs/c"])
            .page("/docs/b", &["/docs/c"])
            .page("/docs/c", &[]),
    );

    let (report, sink) = crawl(settings(1, 2), site.clone()).await;

    assert_eq!(report.outcome, RunState::Completed);
    assert_eq!(
        documented_urls(&sink),
        vec![
            "https://example.com/docs",
            "https://example.com/docs/a",
            "https://example.com/docs/b",
        ]
    );
    assert_eq!(report.counts.total(), 3);
    assert!(!site.calls().iter().any(|url| url.contains("other.com")));
    assert!(!site.calls().iter().any(|url| url.ends_with("/docs/c")));
}

#[tokio::test]
async fn test_timeout_fails_url_and_crawl_continues() {
    let site = Arc::new(
        FakeSite::new()
            .page("/docs", &["/docs/a", "/docs/b"])
            .page("/docs/a", &[])
            .page("/docs/b", &[])
            .delay("/docs/a", Duration::from_secs(10)),
    );
    let mut settings = settings(1, 2);
    settings.readiness_timeout = Duration::from_millis(200);

    let (report, sink) = crawl(settings, site).await;

    assert!(report.is_completed());
    assert_eq!(report.counts.done, 2);
    assert_eq!(report.counts.failed, 1);
    assert_eq!(report.failed_urls.len(), 1);
    assert_eq!(report.failed_urls[0].url, "https://example.com/docs/a");
    assert_eq!(report.failed_urls[0].kind, ErrorKind::Timeout);
    assert!(documented_urls(&sink).contains(&"https://example.com/docs/b".to_string()));
}

#[tokio::test]
async fn test_link_found_twice_is_fetched_once() {
    let site = Arc::new(
        FakeSite::new()
            .page("/docs", &["/docs/a", "/docs/b"])
            .page("/docs/a", &["/docs/c"])
            .page("/docs/b", &["/docs/c#section", "/docs/c/"])
            .page("/docs/c", &[]),
    );

    let (report, _sink) = crawl(settings(2, 2), site.clone()).await;

    let c_fetches = site
        .calls()
        .iter()
        .filter(|url| url.starts_with("https://example.com/docs/c"))
        .count();
    assert_eq!(c_fetches, 1);
    assert_eq!(report.counts.total(), 4);
    assert_eq!(report.counts.done, 4);
}

#[tokio::test]
async fn test_max_depth_is_respected() {
    let site = Arc::new(
        FakeSite::new()
            .page("/docs", &["/docs/a"])
            .page("/docs/a", &["/docs/b"])
            .page("/docs/b", &["/docs/c"])
            .page("/docs/c", &[]),
    );

    let (report, _sink) = crawl(settings(2, 1), site.clone()).await;

    assert_eq!(
        site.calls(),
        vec![
            "https://example.com/docs",
            "https://example.com/docs/a",
            "https://example.com/docs/b",
        ]
    );
    assert_eq!(report.counts.total(), 3);
}

#[tokio::test]
async fn test_http_error_status_fails_url() {
    let site = Arc::new(
        FakeSite::new()
            .page("/docs", &["/docs/missing", "/docs/a"])
            .page("/docs/a", &[]),
    );

    let (report, _sink) = crawl(settings(1, 1), site).await;

    assert!(report.is_completed());
    assert_eq!(report.counts.done, 2);
    assert_eq!(report.failed_urls.len(), 1);
    assert_eq!(report.failed_urls[0].url, "https://example.com/docs/missing");
    assert_eq!(report.failed_urls[0].kind, ErrorKind::HttpStatus(404));
}

#[tokio::test]
async fn test_redirect_to_known_url_writes_no_duplicate() {
    let site = Arc::new(
        FakeSite::new()
            .page("/docs", &["/docs/a", "/docs/old"])
            .page("/docs/a", &[])
            .redirect("/docs/old", "/docs/a"),
    );

    let (report, sink) = crawl(settings(1, 1), site).await;

    assert_eq!(report.counts.done, 3);
    assert_eq!(report.documents_written, 2);
    assert_eq!(
        documented_urls(&sink),
        vec!["https://example.com/docs", "https://example.com/docs/a"]
    );
}

#[tokio::test]
async fn test_engine_crash_aborts_run() {
    let site = Arc::new(
        FakeSite::new()
            .page("/docs", &["/docs/a", "/docs/b"])
            .page("/docs/a", &[])
            .page("/docs/b", &[])
            .crash_on("/docs/a"),
    );

    let (report, sink) = crawl(settings(1, 1), site).await;

    assert_eq!(report.outcome, RunState::Aborted);
    assert!(report.abort_reason.is_some());
    assert_eq!(report.failed_urls[0].kind, ErrorKind::Engine);
    assert_eq!(documented_urls(&sink), vec!["https://example.com/docs"]);
    assert_eq!(sink.reports().len(), 1);
}

#[tokio::test]
async fn test_cancel_aborts_and_keeps_partial_output() {
    let site = Arc::new(
        FakeSite::new()
            .page("/docs", &["/docs/a", "/docs/b"])
            .page("/docs/a", &[])
            .page("/docs/b", &[])
            .delay("/docs/a", Duration::from_secs(60)),
    );
    let mut settings = settings(1, 2);
    settings.readiness_timeout = Duration::from_secs(120);

    let sink = MemorySink::new();
    let mut coordinator = Coordinator::new(Arc::new(settings), site, Box::new(sink.clone()));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let report = coordinator.run(cancel).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(report.outcome, RunState::Aborted);
    assert_eq!(report.abort_reason.as_deref(), Some("cancelled"));
    assert_eq!(report.counts.in_flight, 1);
    assert_eq!(
        documented_urls(&sink),
        vec!["https://example.com/docs", "https://example.com/docs/b"]
    );
}

#[tokio::test]
async fn test_per_host_delay_spaces_requests() {
    let site = Arc::new(
        FakeSite::new()
            .page("/docs", &["/docs/a", "/docs/b"])
            .page("/docs/a", &[])
            .page("/docs/b", &[]),
    );
    let mut settings = settings(1, 3);
    settings.request_delay = Duration::from_millis(150);

    let (report, _sink) = crawl(settings, site.clone()).await;

    assert_eq!(report.counts.done, 3);
    let times = site.call_times();
    for pair in times.windows(2) {
        assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(140));
    }
}

#[tokio::test]
async fn test_page_limit_completes_run() {
    let site = Arc::new(
        FakeSite::new()
            .page("/docs", &["/docs/a", "/docs/b"])
            .page("/docs/a", &[])
            .page("/docs/b", &[]),
    );
    let mut settings = settings(1, 1);
    settings.max_pages = Some(2);

    let (report, _sink) = crawl(settings, site.clone()).await;

    assert!(report.is_completed());
    assert_eq!(site.calls().len(), 2);
    assert_eq!(report.counts.pending, 1);
}

#[tokio::test]
async fn test_failed_pages_do_not_count_toward_page_limit() {
    let site = Arc::new(
        FakeSite::new()
            .page("/docs", &["/docs/missing", "/docs/a", "/docs/b"])
            .page("/docs/a", &[])
            .page("/docs/b", &[]),
    );
    let mut settings = settings(1, 1);
    settings.max_pages = Some(2);

    let (report, sink) = crawl(settings, site.clone()).await;

    assert!(report.is_completed());
    assert_eq!(
        site.calls(),
        vec![
            "https://example.com/docs",
            "https://example.com/docs/missing",
            "https://example.com/docs/a",
        ]
    );
    assert_eq!(report.documents_written, 2);
    assert_eq!(sink.documents().len(), 2);
    assert_eq!(report.counts.failed, 1);
    assert_eq!(report.counts.pending, 1);
}

#[tokio::test]
async fn test_page_limit_not_overshot_by_concurrent_fetches() {
    let site = Arc::new(
        FakeSite::new()
            .page("/docs", &["/docs/a", "/docs/b", "/docs/c", "/docs/d"])
            .page("/docs/a", &[])
            .page("/docs/b", &[])
            .page("/docs/c", &[])
            .page("/docs/d", &[]),
    );
    let mut settings = settings(1, 4);
    settings.max_pages = Some(3);

    let (report, _sink) = crawl(settings, site.clone()).await;

    assert_eq!(site.calls().len(), 3);
    assert_eq!(report.documents_written, 3);
    assert_eq!(report.counts.pending, 2);
}

#[tokio::test]
async fn test_directory_root_resolves_relative_links() {
    let site = Arc::new(
        FakeSite::new()
            .page("/docs/", &["intro"])
            .page("/docs/intro", &[]),
    );

    let (report, sink) = crawl(settings_for("https://example.com/docs/", 1, 1), site.clone()).await;

    assert!(report.is_completed());
    assert_eq!(
        site.calls(),
        vec!["https://example.com/docs/", "https://example.com/docs/intro"]
    );
    assert_eq!(
        documented_urls(&sink),
        vec!["https://example.com/docs", "https://example.com/docs/intro"]
    );
    assert!(markdown_for(&sink, "https://example.com/docs")
        .contains("[intro](https://example.com/docs/intro)"));
}

#[tokio::test]
async fn test_markdown_links_resolve_against_served_url() {
    let site = Arc::new(
        FakeSite::new()
            .page("/docs", &["/docs/guide/", "/docs/old"])
            .page("/docs/guide/", &["setup"])
            .page("/docs/guide/setup", &[])
            .redirect("/docs/old", "/docs/moved/")
            .page("/docs/moved/", &["page"])
            .page("/docs/moved/page", &[]),
    );

    let (report, sink) = crawl(settings(2, 1), site.clone()).await;

    assert!(report.is_completed());
    assert!(site
        .calls()
        .contains(&"https://example.com/docs/guide/setup".to_string()));
    assert!(markdown_for(&sink, "https://example.com/docs/guide")
        .contains("[setup](https://example.com/docs/guide/setup)"));
    assert!(markdown_for(&sink, "https://example.com/docs/old")
        .contains("[page](https://example.com/docs/moved/page)"));
}

#[tokio::test]
async fn test_http_and_https_links_share_one_record() {
    let site = Arc::new(
        FakeSite::new()
            .page(
                "/docs",
                &["http://example.com/docs/a", "https://example.com/docs/a"],
            )
            .page("/docs/a", &[]),
    );

    let (report, sink) = crawl(settings(1, 2), site.clone()).await;

    assert_eq!(
        site.calls(),
        vec!["https://example.com/docs", "https://example.com/docs/a"]
    );
    assert_eq!(report.counts.total(), 2);
    assert_eq!(report.counts.done, 2);
    assert_eq!(sink.documents().len(), 2);
}

#[tokio::test]
async fn test_resume_continues_from_ledger() {
    let dir = TempDir::new().unwrap();
    let ledger = dir.path().join("ledger.db");
    let site = || {
        Arc::new(
            FakeSite::new()
                .page("/docs", &["/docs/a", "/docs/b"])
                .page("/docs/a", &[])
                .page("/docs/b", &[]),
        )
    };

    // First run stops after the root page
    let mut first_settings = settings(1, 1);
    first_settings.max_pages = Some(1);
    let first_site = site();
    let mut first = Coordinator::new(
        Arc::new(first_settings),
        first_site.clone(),
        Box::new(MemorySink::new()),
    )
    .with_storage(Box::new(SqliteStorage::new(&ledger).unwrap()), StartMode::Fresh)
    .with_config_hash("first");
    let report = first.run(CancellationToken::new()).await.unwrap();
    assert_eq!(report.counts.pending, 2);
    assert_eq!(first_site.calls(), vec!["https://example.com/docs"]);

    // Second run picks up the two pending pages only
    let second_site = site();
    let sink = MemorySink::new();
    let mut second = Coordinator::new(
        Arc::new(settings(1, 1)),
        second_site.clone(),
        Box::new(sink.clone()),
    )
    .with_storage(Box::new(SqliteStorage::new(&ledger).unwrap()), StartMode::Resume)
    .with_config_hash("second");
    let report = second.run(CancellationToken::new()).await.unwrap();

    assert!(report.is_completed());
    assert_eq!(
        second_site.calls(),
        vec!["https://example.com/docs/a", "https://example.com/docs/b"]
    );
    assert_eq!(report.counts.done, 3);
    assert_eq!(sink.documents().len(), 2);

    let storage = SqliteStorage::new(&ledger).unwrap();
    let records = storage.load_urls().unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.status == UrlStatus::Done));
    let latest = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(latest.status, RunState::Completed);
    assert_eq!(latest.config_hash, "second");
}

#[tokio::test]
async fn test_retry_failed_refetches_only_failures() {
    let dir = TempDir::new().unwrap();
    let ledger = dir.path().join("ledger.db");

    let broken = Arc::new(
        FakeSite::new()
            .page("/docs", &["/docs/a", "/docs/b"])
            .page("/docs/a", &[])
            .page("/docs/b", &[])
            .status("/docs/a", 503),
    );
    let mut first = Coordinator::new(
        Arc::new(settings(1, 1)),
        broken,
        Box::new(MemorySink::new()),
    )
    .with_storage(Box::new(SqliteStorage::new(&ledger).unwrap()), StartMode::Fresh);
    let report = first.run(CancellationToken::new()).await.unwrap();
    assert_eq!(report.failed_urls[0].kind, ErrorKind::HttpStatus(503));

    let fixed = Arc::new(
        FakeSite::new()
            .page("/docs", &["/docs/a", "/docs/b"])
            .page("/docs/a", &[])
            .page("/docs/b", &[]),
    );
    let mut second = Coordinator::new(
        Arc::new(settings(1, 1)),
        fixed.clone(),
        Box::new(MemorySink::new()),
    )
    .with_storage(
        Box::new(SqliteStorage::new(&ledger).unwrap()),
        StartMode::RetryFailed,
    );
    let report = second.run(CancellationToken::new()).await.unwrap();

    assert_eq!(fixed.calls(), vec!["https://example.com/docs/a"]);
    assert_eq!(report.counts.done, 3);
    assert_eq!(report.counts.failed, 0);
}

#[tokio::test]
async fn test_markdown_directory_layout() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(
        FakeSite::new()
            .page("/docs", &["/docs/guide/intro.html", "/docs/search?q=rust"])
            .page("/docs/guide/intro.html", &[])
            .page("/docs/search?q=rust", &[]),
    );

    let sink = MarkdownDirSink::new(dir.path());
    let mut coordinator = Coordinator::new(Arc::new(settings(1, 1)), site, Box::new(sink));
    let report = coordinator.run(CancellationToken::new()).await.unwrap();
    assert_eq!(report.documents_written, 3);

    let host_dir = dir.path().join("example.com");
    assert!(host_dir.join("docs.md").exists());
    assert!(host_dir.join("docs/guide/intro.md").exists());

    let search_files: Vec<_> = std::fs::read_dir(host_dir.join("docs"))
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with("search-") && name.ends_with(".md"))
        .collect();
    assert_eq!(search_files.len(), 1);

    let intro = std::fs::read_to_string(host_dir.join("docs/guide/intro.md")).unwrap();
    assert!(intro.starts_with("---\nsource_url: \"https://example.com/docs/guide/intro.html\""));
    assert!(intro.contains("# Page /docs/guide/intro.html"));
    assert!(!intro.contains("Copyright"));

    let summary = std::fs::read_to_string(dir.path().join(SUMMARY_JSON_FILE)).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&summary).unwrap();
    assert_eq!(summary["outcome"], "completed");
    assert_eq!(summary["counts"]["done"], 3);
}
