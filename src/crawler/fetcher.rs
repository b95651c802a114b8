//! Page fetcher
//!
//! This module wraps a [`PageEngine`] with the per-fetch policy of a crawl:
//! - the readiness timeout
//! - mapping non-2xx main-document statuses to errors
//! - retry with exponential backoff for transient failures
//! - error classification

use crate::config::{CrawlSettings, RenderWaitPolicy, RetryPolicy};
use crate::crawler::engine::{PageEngine, RenderedPage};
use crate::state::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a fetch failed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The render-wait condition did not hold within the readiness bound
    #[error("Timed out waiting for the page to settle")]
    Timeout,

    /// Connection or navigation failure
    #[error("Network error: {0}")]
    Network(String),

    /// The main document answered with a non-2xx status
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// The browser engine is gone; fatal for the whole run
    #[error("Browser engine failure: {0}")]
    Engine(String),
}

impl FetchError {
    /// Classification stored with the failed URL
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout => ErrorKind::Timeout,
            Self::Network(_) => ErrorKind::Network,
            Self::HttpStatus(code) => ErrorKind::HttpStatus(*code),
            Self::Engine(_) => ErrorKind::Engine,
        }
    }

    /// Returns true if another attempt could succeed
    ///
    /// | Condition | Retried |
    /// |-----------|---------|
    /// | Timeout | yes |
    /// | Network | yes |
    /// | HTTP 429, 5xx | yes |
    /// | Other HTTP status | no |
    /// | Engine | no |
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::HttpStatus(code) => *code == 429 || (500..600).contains(code),
            Self::Engine(_) => false,
        }
    }

    /// Returns true if the whole run must stop
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Engine(_))
    }
}

/// Fetches pages through a shared engine
///
/// Cloning is cheap; every in-flight fetch task owns a clone.
#[derive(Clone)]
pub struct Fetcher {
    engine: Arc<dyn PageEngine>,
    wait: RenderWaitPolicy,
    timeout: Duration,
    retry: RetryPolicy,

    /// Lower bound for the wait before a retry, the per-host request delay
    min_retry_delay: Duration,
}

impl Fetcher {
    pub fn new(
        engine: Arc<dyn PageEngine>,
        wait: RenderWaitPolicy,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            engine,
            wait,
            timeout,
            retry,
            min_retry_delay: Duration::ZERO,
        }
    }

    /// Never retries sooner than `delay` after a failed attempt
    pub fn with_min_retry_delay(mut self, delay: Duration) -> Self {
        self.min_retry_delay = delay;
        self
    }

    /// Builds a fetcher from crawl settings
    pub fn from_settings(engine: Arc<dyn PageEngine>, settings: &CrawlSettings) -> Self {
        Self::new(
            engine,
            settings.render_wait.clone(),
            settings.readiness_timeout,
            settings.retry,
        )
        .with_min_retry_delay(settings.request_delay)
    }

    /// Fetches a URL, retrying transient failures
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to navigate to
    ///
    /// # Returns
    ///
    /// * `Ok(RenderedPage)` - The rendered HTML and the final URL
    /// * `Err(FetchError)` - The last error once attempts are exhausted, or
    ///   the first non-retryable one
    pub async fn fetch(&self, url: &Url) -> Result<RenderedPage, FetchError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_for(attempt).max(self.min_retry_delay);
                    tracing::debug!(
                        "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                        attempt,
                        max_attempts,
                        url,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &Url) -> Result<RenderedPage, FetchError> {
        let page = tokio::time::timeout(self.timeout, self.engine.render(url, &self.wait))
            .await
            .map_err(|_| FetchError::Timeout)??;

        match page.status {
            Some(code) if !(200..300).contains(&code) => Err(FetchError::HttpStatus(code)),
            _ => Ok(page),
        }
    }
}
