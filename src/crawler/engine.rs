//! The rendering seam between the crawler and a browser
//!
//! The coordinator only ever talks to a [`PageEngine`]. The production
//! implementation drives Chrome over the DevTools protocol; tests plug in
//! scripted engines.

use crate::config::RenderWaitPolicy;
use crate::crawler::fetcher::FetchError;
use async_trait::async_trait;
use url::Url;

/// A page as the browser left it after the render-wait condition held
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    /// Serialized DOM after scripts ran
    pub html: String,

    /// URL the browser ended up on after redirects
    pub final_url: Url,

    /// HTTP status of the main document, when the engine observed one
    pub status: Option<u16>,
}

/// A shared browser engine
///
/// One engine serves every fetch of a crawl. Implementations must give each
/// call to [`render`](PageEngine::render) its own isolated browsing context
/// and release it on every exit path, including when the returned future is
/// dropped before completion.
#[async_trait]
pub trait PageEngine: Send + Sync {
    /// Navigates to `url` and waits until `wait` holds
    ///
    /// Returns [`FetchError::Engine`] only when the engine itself is gone;
    /// per-page problems map to the other variants.
    async fn render(&self, url: &Url, wait: &RenderWaitPolicy) -> Result<RenderedPage, FetchError>;

    /// Releases the engine
    async fn shutdown(&self) -> Result<(), FetchError> {
        Ok(())
    }
}
