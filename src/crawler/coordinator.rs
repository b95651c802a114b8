//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Opening the ledger and restoring the frontier
//! - Dispatching fetches under the concurrency cap and per-host delay
//! - Running link extraction, normalization and persistence per result
//! - Handling cancellation and engine failure
//! - Producing the final crawl report

use crate::config::CrawlSettings;
use crate::content::HtmlNormalizer;
use crate::crawler::engine::{PageEngine, RenderedPage};
use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::crawler::frontier::{Enqueued, Frontier, Redirect, StartMode};
use crate::crawler::links::try_extract_links;
use crate::crawler::politeness::Politeness;
use crate::output::{CrawlReport, FailedUrl, PageSink};
use crate::state::{ErrorKind, RunState};
use crate::storage::Storage;
use crate::url::{host_key, normalize_parsed};
use crate::{HarvestError, Result};
use chrono::Utc;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// How often progress is logged, in completed fetches
const PROGRESS_INTERVAL: u64 = 10;

type FetchOutcome = (String, std::result::Result<RenderedPage, FetchError>);

/// State that lives for exactly one run
struct CrawlRun {
    frontier: Frontier,
    politeness: Politeness,
    run_id: Option<i64>,

    /// Key of the URL each running fetch task is working on
    in_flight: HashMap<Id, String>,
    completed: u64,
    documents_written: u64,
    visited: Vec<String>,
    abort_reason: Option<String>,
}

impl CrawlRun {
    /// True once saved pages plus fetches still running reach the page limit
    ///
    /// Failed pages do not count, so their slots go to later URLs.
    fn page_limit_reached(&self, max_pages: Option<u32>) -> bool {
        max_pages.map_or(false, |max| {
            self.documents_written + self.in_flight.len() as u64 >= u64::from(max)
        })
    }
}

/// Main crawler coordinator structure
///
/// The coordinator task is the only owner of the frontier. Fetches run as
/// separate tasks and hand their results back; everything after the fetch
/// (extraction, enqueueing, normalization, persistence) happens here, one
/// result at a time, in completion order.
pub struct Coordinator {
    settings: Arc<CrawlSettings>,
    fetcher: Fetcher,
    normalizer: HtmlNormalizer,
    sink: Box<dyn PageSink>,
    storage: Option<Box<dyn Storage>>,
    mode: StartMode,
    config_hash: String,
    state: RunState,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `settings` - The crawl configuration, fixed for the run
    /// * `engine` - The shared browser engine
    /// * `sink` - Where page documents are written
    pub fn new(
        settings: Arc<CrawlSettings>,
        engine: Arc<dyn PageEngine>,
        sink: Box<dyn PageSink>,
    ) -> Self {
        Self {
            fetcher: Fetcher::from_settings(engine, &settings),
            normalizer: HtmlNormalizer::new(&settings.content),
            settings,
            sink,
            storage: None,
            mode: StartMode::Fresh,
            config_hash: String::new(),
            state: RunState::Idle,
        }
    }

    /// Mirrors every URL record into `storage` and starts from it per `mode`
    pub fn with_storage(mut self, storage: Box<dyn Storage>, mode: StartMode) -> Self {
        self.storage = Some(storage);
        self.mode = mode;
        self
    }

    /// Hash of the effective configuration, stored with the run
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(HarvestError::InvalidRunTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!("Run state {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Runs the main crawl loop
    ///
    /// This is the core crawling logic that:
    /// 1. Opens the ledger (if any) and restores or seeds the frontier
    /// 2. Dispatches fetches while slots and polite hosts are available
    /// 3. Processes each finished fetch in completion order
    /// 4. Stops when the frontier is exhausted, the page limit is drained,
    ///    the engine fails, or `cancel` fires
    /// 5. Records the outcome and finalizes the sink
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The run finished, completed or aborted
    /// * `Err(HarvestError)` - The run could not start, or the ledger or
    ///   sink failed outside a single URL
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<CrawlReport> {
        self.transition(RunState::Running)?;
        let started_at = Utc::now();
        let clock = Instant::now();

        let mut run = self.open_run()?;
        tracing::info!(
            "Starting crawl of {} (max depth {}, concurrency {})",
            self.settings.root_url,
            self.settings.max_depth,
            self.settings.concurrency_limit
        );

        let root = self.settings.root_fetch_url.clone();
        if run.frontier.enqueue(&root, 0, None) == Enqueued::Added {
            let root_key = self.settings.root_url.to_string();
            self.mirror(&run, &root_key)?;
        }

        let mut tasks: JoinSet<FetchOutcome> = JoinSet::new();

        let outcome = loop {
            if run.abort_reason.is_some() {
                break RunState::Aborted;
            }

            self.dispatch(&mut run, &mut tasks)?;

            let limit_reached = run.page_limit_reached(self.settings.max_pages);
            if tasks.is_empty() && (limit_reached || !run.frontier.has_pending()) {
                if limit_reached && run.frontier.has_pending() {
                    tracing::info!(
                        "Page limit reached after {} pages, {} URLs left pending",
                        run.documents_written,
                        run.frontier.counts().pending
                    );
                }
                break RunState::Completed;
            }

            let waiting_on_host = !limit_reached
                && run.frontier.has_pending()
                && tasks.len() < self.settings.concurrency_limit;
            let wait = if waiting_on_host {
                self.host_wait(&run)
            } else {
                Duration::ZERO
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!("Crawl cancelled, waiting up to {:?} for in-flight pages", self.settings.cancel_grace);
                    run.abort_reason = Some("cancelled".to_string());
                    self.drain(&mut run, &mut tasks).await?;
                    break RunState::Aborted;
                }
                Some(joined) = tasks.join_next_with_id(), if !tasks.is_empty() => {
                    self.handle_joined(&mut run, joined, clock)?;
                }
                _ = tokio::time::sleep(wait), if waiting_on_host => {}
            }
        };

        if !tasks.is_empty() {
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        self.finish(run, outcome, started_at, clock)
    }

    /// Creates the run in the ledger and rebuilds the frontier from it
    fn open_run(&mut self) -> Result<CrawlRun> {
        let max_depth = self.settings.max_depth;
        let mut run = CrawlRun {
            frontier: Frontier::new(max_depth),
            politeness: Politeness::new(self.settings.request_delay),
            run_id: None,
            in_flight: HashMap::new(),
            completed: 0,
            documents_written: 0,
            visited: Vec::new(),
            abort_reason: None,
        };

        let storage = match self.storage.as_mut() {
            Some(storage) => storage,
            None => return Ok(run),
        };

        if let Some(previous) = storage.get_latest_run()? {
            if self.mode != StartMode::Fresh {
                if previous.was_interrupted() {
                    tracing::info!("Resuming after interrupted run {}", previous.id);
                }
                if previous.root_url != self.settings.root_url.as_str() {
                    tracing::warn!(
                        "Ledger belongs to {}, now crawling {}",
                        previous.root_url,
                        self.settings.root_url
                    );
                }
                if !self.config_hash.is_empty() && previous.config_hash != self.config_hash {
                    tracing::warn!(
                        "Configuration changed since run {}; resuming anyway",
                        previous.id
                    );
                }
            }
        }

        let records = if self.mode == StartMode::Fresh {
            storage.clear_urls()?;
            Vec::new()
        } else {
            storage.load_urls()?
        };

        run.run_id = Some(storage.create_run(self.settings.root_url.as_str(), &self.config_hash)?);
        run.frontier = Frontier::restore(max_depth, records, self.mode);
        Ok(run)
    }

    /// Starts fetches until the pool is full or no pending URL may start yet
    fn dispatch(&mut self, run: &mut CrawlRun, tasks: &mut JoinSet<FetchOutcome>) -> Result<()> {
        while tasks.len() < self.settings.concurrency_limit
            && !run.page_limit_reached(self.settings.max_pages)
        {
            let now = Instant::now();
            let politeness = &run.politeness;
            let record = match run.frontier.next_matching(|record| {
                host_key(&record.fetch_url).map_or(true, |host| politeness.is_ready(&host, now))
            }) {
                Some(record) => record,
                None => break,
            };

            if let Some(host) = host_key(&record.fetch_url) {
                run.politeness.record_request(&host, now);
            }
            self.mirror(run, record.key())?;

            tracing::debug!(
                "Fetching {} (depth {}, attempt {})",
                record.fetch_url,
                record.depth,
                record.attempts
            );

            let fetcher = self.fetcher.clone();
            let key = record.key().to_string();
            let url = record.fetch_url;
            let task_key = key.clone();
            let handle = tasks.spawn(async move {
                let result = match AssertUnwindSafe(fetcher.fetch(&url)).catch_unwind().await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Network("fetch task panicked".to_string())),
                };
                (task_key, result)
            });
            run.in_flight.insert(handle.id(), key);
        }
        Ok(())
    }

    /// How long until a host of some pending URL accepts a request
    fn host_wait(&self, run: &CrawlRun) -> Duration {
        let hosts: Vec<String> = run
            .frontier
            .pending()
            .filter_map(|record| host_key(&record.fetch_url))
            .collect();
        run.politeness
            .wait_time(hosts.iter().map(String::as_str), Instant::now())
    }

    /// Lets in-flight fetches finish within the grace period, then stops them
    async fn drain(&mut self, run: &mut CrawlRun, tasks: &mut JoinSet<FetchOutcome>) -> Result<()> {
        let deadline = tokio::time::sleep(self.settings.cancel_grace);
        tokio::pin!(deadline);

        while !tasks.is_empty() {
            tokio::select! {
                _ = &mut deadline => {
                    tracing::warn!("Grace period over, abandoning {} fetches", tasks.len());
                    break;
                }
                Some(joined) = tasks.join_next_with_id() => {
                    self.handle_joined(run, joined, Instant::now())?;
                }
            }
        }
        Ok(())
    }

    fn handle_joined(
        &mut self,
        run: &mut CrawlRun,
        joined: std::result::Result<(Id, FetchOutcome), JoinError>,
        clock: Instant,
    ) -> Result<()> {
        let (key, result) = match joined {
            Ok((id, outcome)) => {
                run.in_flight.remove(&id);
                outcome
            }
            Err(e) => {
                let Some(key) = run.in_flight.remove(&e.id()) else {
                    tracing::error!("Unknown fetch task ended without a result: {}", e);
                    return Ok(());
                };
                tracing::error!("Fetch task for {} ended without a result: {}", key, e);
                (key, Err(FetchError::Network(format!("fetch task ended: {}", e))))
            }
        };

        match result {
            Ok(page) => self.handle_page(run, &key, page)?,
            Err(e) => self.handle_failure(run, &key, e)?,
        }

        run.completed += 1;
        if run.completed % PROGRESS_INTERVAL == 0 {
            let counts = run.frontier.counts();
            let rate = run.completed as f64 / clock.elapsed().as_secs_f64().max(f64::EPSILON);
            tracing::info!(
                "Progress: {} done, {} failed, {} pending, {:.2} pages/sec",
                counts.done,
                counts.failed,
                counts.pending,
                rate
            );
        }
        Ok(())
    }

    fn handle_failure(&mut self, run: &mut CrawlRun, key: &str, error: FetchError) -> Result<()> {
        if error.is_fatal() {
            tracing::error!("Browser engine failed while fetching {}: {}", key, error);
            if run.abort_reason.is_none() {
                run.abort_reason = Some(error.to_string());
            }
        } else {
            tracing::warn!("Failed to fetch {}: {}", key, error);
        }
        self.fail(run, key, error.kind(), error.to_string())
    }

    /// Runs extraction, normalization and persistence for one fetched page
    fn handle_page(&mut self, run: &mut CrawlRun, key: &str, page: RenderedPage) -> Result<()> {
        let record = run
            .frontier
            .get(key)
            .cloned()
            .ok_or_else(|| HarvestError::UnknownUrl(key.to_string()))?;

        match run.frontier.register_redirect(key, &page.final_url) {
            Redirect::Same => {}
            Redirect::Alias(target) => {
                tracing::debug!("{} redirected to {}", key, target);
            }
            Redirect::Known(owner) => {
                tracing::info!("{} redirected to already known {}, skipping", key, owner);
                run.frontier.mark_done(key)?;
                return self.mirror(run, key);
            }
        }

        if record.depth < self.settings.max_depth {
            let links = match try_extract_links(&page.html, &page.final_url, &self.settings.scope) {
                Ok(links) => links,
                Err(e) => {
                    tracing::warn!("Link extraction failed for {}: {}", key, e);
                    Vec::new()
                }
            };

            let mut added = 0;
            for link in &links {
                if run.frontier.enqueue(link, record.depth + 1, Some(key)) == Enqueued::Added {
                    if let Ok(link_key) = normalize_parsed(link) {
                        self.mirror(run, link_key.as_str())?;
                    }
                    added += 1;
                }
            }
            tracing::debug!("{}: {} links, {} new", key, links.len(), added);
        }

        let document = match self
            .normalizer
            .normalize_page(&page.html, &record.url, &page.final_url)
        {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Could not normalize {}: {}", key, e);
                return self.fail(run, key, ErrorKind::Normalization, e.to_string());
            }
        };

        if let Err(e) = self.sink.persist(&document) {
            tracing::error!("Could not write document for {}: {}", key, e);
            return self.fail(run, key, ErrorKind::Persistence, e.to_string());
        }

        run.frontier.mark_done(key)?;
        run.documents_written += 1;
        run.visited.push(key.to_string());
        tracing::info!("Harvested {} ({})", key, document.title);
        self.mirror(run, key)
    }

    fn fail(&mut self, run: &mut CrawlRun, key: &str, kind: ErrorKind, message: String) -> Result<()> {
        run.frontier.mark_failed(key, kind, message)?;
        self.mirror(run, key)
    }

    /// Writes the current state of a record to the ledger
    fn mirror(&mut self, run: &CrawlRun, key: &str) -> Result<()> {
        if let (Some(storage), Some(run_id)) = (self.storage.as_mut(), run.run_id) {
            if let Some(record) = run.frontier.get(key) {
                storage.upsert_url(record, run_id)?;
            }
        }
        Ok(())
    }

    fn finish(
        &mut self,
        run: CrawlRun,
        outcome: RunState,
        started_at: chrono::DateTime<Utc>,
        clock: Instant,
    ) -> Result<CrawlReport> {
        self.transition(outcome)?;

        if let (Some(storage), Some(run_id)) = (self.storage.as_mut(), run.run_id) {
            storage.finish_run(run_id, outcome)?;
        }

        let failed_urls = run
            .frontier
            .failed()
            .into_iter()
            .map(|record| {
                let (kind, message) = record
                    .error
                    .clone()
                    .unwrap_or((ErrorKind::Network, String::new()));
                FailedUrl {
                    url: record.key().to_string(),
                    kind,
                    message,
                    depth: record.depth,
                }
            })
            .collect();

        let report = CrawlReport {
            root_url: self.settings.root_url.to_string(),
            outcome,
            run_id: run.run_id,
            started_at,
            finished_at: Utc::now(),
            elapsed_seconds: clock.elapsed().as_secs_f64(),
            counts: run.frontier.counts(),
            documents_written: run.documents_written,
            visited_urls: run.visited,
            failed_urls,
            abort_reason: run.abort_reason,
        };

        tracing::info!(
            "Crawl {}: {} done, {} failed, {} pending in {:.1}s",
            outcome,
            report.counts.done,
            report.counts.failed,
            report.counts.pending,
            report.elapsed_seconds
        );

        self.sink.finalize(&report)?;
        Ok(report)
    }
}
