//! Content module: turns rendered HTML into page documents
//!
//! # Components
//!
//! - `HtmlNormalizer`: locates the content region, strips chrome and
//!   converts it to Markdown
//! - `ContentLocator`: pluggable strategies for finding the content region
//! - `MarkdownConverter`: cleans the region and renders it with `htmd`
//! - `PageDocument`: the normalized page handed to a sink

mod convert;
mod document;
mod locator;

pub use convert::MarkdownConverter;
pub use document::PageDocument;
pub use locator::{
    text_len, BodyLocator, ContentLocator, DensestDivLocator, LocatorChain, SelectorLocator,
    SemanticLocator, SEMANTIC_SELECTORS,
};

use crate::config::ContentSettings;
use crate::crawler::document_base;
use convert::collapse_whitespace;
use scraper::{Html, Selector};
use thiserror::Error;
use url::Url;

/// Errors raised while normalizing a page
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("No content could be extracted from {0}")]
    EmptyContent(String),

    #[error("Markdown conversion failed for {url}: {message}")]
    Conversion { url: String, message: String },
}

/// Converts rendered pages into [`PageDocument`]s
pub struct HtmlNormalizer {
    chain: LocatorChain,
    exclude: Vec<Selector>,
}

impl HtmlNormalizer {
    /// Creates a normalizer from content settings
    ///
    /// Selectors that fail to parse are logged and ignored; configuration
    /// validation rejects them before a crawl starts.
    pub fn new(settings: &ContentSettings) -> Self {
        let selectors = parse_selectors(&settings.selectors);
        let exclude = parse_selectors(&settings.exclude_selectors);
        Self {
            chain: LocatorChain::standard(selectors, settings.min_content_chars),
            exclude,
        }
    }

    /// Creates a normalizer with a custom locator chain
    pub fn with_chain(chain: LocatorChain, exclude: Vec<Selector>) -> Self {
        Self { chain, exclude }
    }

    /// Normalizes a page whose source URL is also where it was served from
    pub fn normalize(&self, html: &str, url: &Url) -> Result<PageDocument, NormalizationError> {
        self.normalize_page(html, url, url)
    }

    /// Normalizes a rendered page
    ///
    /// # Arguments
    ///
    /// * `html` - The rendered HTML
    /// * `source_url` - The URL the document is recorded under
    /// * `page_url` - The URL the browser ended up on; relative links and
    ///   images resolve against it, or against `<base href>` when present
    ///
    /// # Returns
    ///
    /// * `Ok(PageDocument)` - The page title and Markdown body
    /// * `Err(NormalizationError::EmptyContent)` - Nothing but chrome was found
    pub fn normalize_page(
        &self,
        html: &str,
        source_url: &Url,
        page_url: &Url,
    ) -> Result<PageDocument, NormalizationError> {
        let document = Html::parse_document(html);
        let (region, strategy) = self.chain.locate(&document);
        let base = document_base(&document, page_url);

        let converter = MarkdownConverter::new(&base, &self.exclude);
        let markdown = converter
            .convert(region)
            .map_err(|e| NormalizationError::Conversion {
                url: source_url.to_string(),
                message: e.to_string(),
            })?;

        tracing::debug!(
            "Normalized {} using {} locator ({} bytes of markdown)",
            source_url,
            strategy,
            markdown.len()
        );

        if markdown.trim().is_empty() {
            return Err(NormalizationError::EmptyContent(source_url.to_string()));
        }

        let title = extract_title(&document).unwrap_or_else(|| source_url.to_string());
        Ok(PageDocument::new(source_url.clone(), title, markdown))
    }
}

impl Default for HtmlNormalizer {
    fn default() -> Self {
        Self::new(&ContentSettings::default())
    }
}

fn parse_selectors(raw: &[String]) -> Vec<Selector> {
    raw.iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(selector) => Some(selector),
            Err(_) => {
                tracing::warn!("Ignoring invalid CSS selector '{}'", s);
                None
            }
        })
        .collect()
}

/// Title from `<title>`, else the first `<h1>`
fn extract_title(document: &Html) -> Option<String> {
    ["title", "h1"].iter().find_map(|tag| {
        let selector = Selector::parse(tag).ok()?;
        document
            .select(&selector)
            .map(|element| collapse_whitespace(&element.text().collect::<String>()))
            .find(|text| !text.is_empty())
    })
}
