//! Chrome-backed [`PageEngine`] over the DevTools protocol
//!
//! One browser process (launched or attached to) serves the whole crawl.
//! Every render creates a fresh browser context, the CDP equivalent of an
//! incognito profile, so cookies and storage never leak between pages.

use crate::config::{BrowserOptions, RenderWaitPolicy};
use crate::crawler::engine::{PageEngine, RenderedPage};
use crate::crawler::fetcher::FetchError;
use crate::{HarvestError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{BrowserContextId, CloseParams};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, ResourceType, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use url::Url;

/// How often readiness conditions are re-checked
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const READY_STATE_JS: &str = "document.readyState";
const RESOURCE_COUNT_JS: &str = "performance.getEntriesByType('resource').length";

/// Response of the DevTools `/json/version` endpoint
#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

/// Resolves the WebSocket URL of a running browser
///
/// `ws://` and `wss://` URLs are returned unchanged. Anything else is taken
/// as the DevTools HTTP endpoint (`http://127.0.0.1:9222`) and asked for
/// its `webSocketDebuggerUrl`.
pub async fn discover_websocket_url(endpoint: &str) -> Result<String> {
    if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
        return Ok(endpoint.to_string());
    }

    let version_url = format!("{}/json/version", endpoint.trim_end_matches('/'));
    tracing::debug!("Querying {} for the browser WebSocket URL", version_url);

    let response = reqwest::get(&version_url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| HarvestError::Engine(format!("Cannot reach {}: {}", version_url, e)))?;

    let info: VersionInfo = response.json().await.map_err(|e| {
        HarvestError::Engine(format!("Unexpected response from {}: {}", version_url, e))
    })?;

    Ok(info.web_socket_debugger_url)
}

/// Shared Chrome instance
pub struct ChromeEngine {
    browser: Arc<Browser>,
    alive: Arc<AtomicBool>,
    handler: Mutex<Option<JoinHandle<()>>>,
    user_agent: String,
}

impl ChromeEngine {
    /// Launches a browser, or attaches to `options.remote_url` when set
    pub async fn start(options: &BrowserOptions) -> Result<Self> {
        let (browser, handler) = match &options.remote_url {
            Some(endpoint) => {
                let ws_url = discover_websocket_url(endpoint).await?;
                tracing::info!("Attaching to browser at {}", ws_url);
                Browser::connect(ws_url)
                    .await
                    .map_err(|e| HarvestError::Engine(format!("Failed to attach: {}", e)))?
            }
            None => {
                let config = Self::launch_config(options)?;
                tracing::info!(
                    "Launching {} browser",
                    if options.headless { "headless" } else { "headed" }
                );
                Browser::launch(config)
                    .await
                    .map_err(|e| HarvestError::Engine(format!("Failed to launch browser: {}", e)))?
            }
        };

        let alive = Arc::new(AtomicBool::new(true));
        let flag = alive.clone();
        let mut handler = handler;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("Browser handler error: {}", e);
                }
            }
            flag.store(false, Ordering::SeqCst);
            tracing::warn!("Browser connection closed");
        });

        Ok(Self {
            browser: Arc::new(browser),
            alive,
            handler: Mutex::new(Some(handler_task)),
            user_agent: options.user_agent.clone(),
        })
    }

    fn launch_config(options: &BrowserOptions) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .window_size(options.viewport.0, options.viewport.1)
            .no_sandbox();
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &options.executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(HarvestError::Engine)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn map_error(&self, err: CdpError) -> FetchError {
        if !self.is_alive() {
            return FetchError::Engine(err.to_string());
        }
        match err {
            CdpError::Timeout => FetchError::Timeout,
            other => FetchError::Network(other.to_string()),
        }
    }

    /// Creates an isolated context with one blank page in it
    async fn open_context(&self) -> std::result::Result<ContextGuard, FetchError> {
        if !self.is_alive() {
            return Err(FetchError::Engine("browser is not running".to_string()));
        }

        let context_id = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| self.map_error(e))?
            .result
            .browser_context_id;

        let mut guard = ContextGuard::new(self.browser.clone(), context_id.clone());

        let page = self
            .browser
            .new_page(blank_target(context_id)?)
            .await
            .map_err(|e| self.map_error(e))?;
        guard.page = Some(page);

        Ok(guard)
    }

    async fn render_in(
        &self,
        page: &Page,
        url: &Url,
        wait: &RenderWaitPolicy,
    ) -> std::result::Result<RenderedPage, CdpError> {
        page.execute(SetUserAgentOverrideParams::new(self.user_agent.clone()))
            .await?;
        page.execute(EnableParams::default()).await?;

        let mut responses = page.event_listener::<EventResponseReceived>().await?;
        let status_task = tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                if event.r#type == ResourceType::Document {
                    return Some(event.response.status as u16);
                }
            }
            None
        });

        page.goto(url.as_str()).await?;
        wait_until_ready(page, wait).await?;

        let html = page.content().await?;
        let final_url = page
            .url()
            .await?
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| url.clone());

        let status = if status_task.is_finished() {
            status_task.await.ok().flatten()
        } else {
            status_task.abort();
            None
        };

        Ok(RenderedPage {
            html,
            final_url,
            status,
        })
    }
}

#[async_trait]
impl PageEngine for ChromeEngine {
    async fn render(
        &self,
        url: &Url,
        wait: &RenderWaitPolicy,
    ) -> std::result::Result<RenderedPage, FetchError> {
        let guard = self.open_context().await?;
        let started = Instant::now();

        let result = match guard.page.as_ref() {
            Some(page) => self
                .render_in(page, url, wait)
                .await
                .map_err(|e| self.map_error(e)),
            None => Err(FetchError::Engine("page was not created".to_string())),
        };

        guard.release().await;
        tracing::debug!(
            "Rendered {} with {} wait in {:?}",
            url,
            wait.name(),
            started.elapsed()
        );
        result
    }

    async fn shutdown(&self) -> std::result::Result<(), FetchError> {
        if self.is_alive() {
            if let Err(e) = self.browser.execute(CloseParams::default()).await {
                tracing::debug!("Browser close command failed: {}", e);
            }
        }

        if let Some(handle) = self.handler.lock().await.take() {
            if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
                tracing::warn!("Browser handler did not stop within 5s");
            }
        }
        Ok(())
    }
}

/// Waits until the render-wait policy holds
///
/// The caller bounds the total time; this loops until the condition is met.
async fn wait_until_ready(page: &Page, wait: &RenderWaitPolicy) -> std::result::Result<(), CdpError> {
    match wait {
        RenderWaitPolicy::DomReady => wait_for_complete(page).await,
        RenderWaitPolicy::NetworkIdle { idle } => {
            wait_for_complete(page).await?;

            let mut last_count = resource_count(page).await?;
            let mut stable_since = Instant::now();
            loop {
                tokio::time::sleep(POLL_INTERVAL).await;
                let count = resource_count(page).await?;
                if count != last_count {
                    last_count = count;
                    stable_since = Instant::now();
                } else if stable_since.elapsed() >= *idle {
                    return Ok(());
                }
            }
        }
        RenderWaitPolicy::Selector(selector) => loop {
            if page.find_element(selector.as_str()).await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        },
        RenderWaitPolicy::Fixed(delay) => {
            tokio::time::sleep(*delay).await;
            Ok(())
        }
    }
}

async fn wait_for_complete(page: &Page) -> std::result::Result<(), CdpError> {
    loop {
        let state = page.evaluate(READY_STATE_JS).await?;
        if state.value().and_then(|v| v.as_str()) == Some("complete") {
            return Ok(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn resource_count(page: &Page) -> std::result::Result<u64, CdpError> {
    let count = page.evaluate(RESOURCE_COUNT_JS).await?;
    Ok(count.value().and_then(|v| v.as_u64()).unwrap_or(0))
}

/// Owns a browser context and its page
///
/// [`release`](ContextGuard::release) is the normal path. When a render is
/// dropped mid-flight (readiness timeout, cancellation) `Drop` spawns the
/// same cleanup in the background.
struct ContextGuard {
    browser: Arc<Browser>,
    context_id: Option<BrowserContextId>,
    page: Option<Page>,
}

impl ContextGuard {
    fn new(browser: Arc<Browser>, context_id: BrowserContextId) -> Self {
        Self {
            browser,
            context_id: Some(context_id),
            page: None,
        }
    }

    async fn release(mut self) {
        let page = self.page.take();
        let context_id = self.context_id.take();
        close_context(&self.browser, page, context_id).await;
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if self.page.is_none() && self.context_id.is_none() {
            return;
        }

        let page = self.page.take();
        let context_id = self.context_id.take();
        let browser = self.browser.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    close_context(&browser, page, context_id).await;
                });
            }
            Err(_) => tracing::warn!("No runtime to release browser context"),
        }
    }
}

/// An `about:blank` tab inside the given browser context
fn blank_target(context_id: BrowserContextId) -> std::result::Result<CreateTargetParams, FetchError> {
    CreateTargetParams::builder()
        .url("about:blank")
        .browser_context_id(context_id)
        .build()
        .map_err(FetchError::Network)
}

async fn close_context(browser: &Browser, page: Option<Page>, context_id: Option<BrowserContextId>) {
    if let Some(page) = page {
        if let Err(e) = page.close().await {
            tracing::trace!("Page close failed: {}", e);
        }
    }
    if let Some(id) = context_id {
        if let Err(e) = browser.execute(DisposeBrowserContextParams::new(id)).await {
            tracing::trace!("Browser context dispose failed: {}", e);
        }
    }
}
