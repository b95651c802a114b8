//! Link extraction from rendered HTML
//!
//! This module turns a rendered page into the list of in-scope URLs the
//! crawl should follow next.

use crate::url::{normalize_parsed, strip_fragment, UrlScope};
use scraper::{Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Errors raised while extracting links
///
/// These never fail a crawl; the caller logs them and continues with zero
/// links.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Invalid link selector: {0}")]
    Selector(String),

    #[error("Page URL cannot be used as a base: {0}")]
    InvalidBase(String),
}

/// Extracts the in-scope links of a rendered page
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` and `<area href="...">` anywhere in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - fragment-only links (same page anchors)
/// - links outside the crawl scope
/// - links back to the page itself
///
/// Relative references are resolved against `<base href>` when present,
/// otherwise against `page_url`. Fragments are stripped. The result keeps
/// document order and contains each normalized URL once.
///
/// # Arguments
///
/// * `html` - The rendered HTML
/// * `page_url` - The final URL of the page
/// * `scope` - The crawl scope predicate
///
/// # Returns
///
/// Absolute, fragment-free URLs in document order. Empty on malformed input.
///
/// # Example
///
/// ```
/// use docharvest::crawler::extract_links;
/// use docharvest::url::UrlScope;
/// use url::Url;
///
/// let root = Url::parse("https://example.com/docs/").unwrap();
/// let scope = UrlScope::from_root(&root).unwrap();
/// let html = r#"<a href="a">A</a><a href="https://other.com/x">X</a>"#;
/// let links = extract_links(html, &root, &scope);
/// assert_eq!(links.len(), 1);
/// assert_eq!(links[0].as_str(), "https://example.com/docs/a");
/// ```
pub fn extract_links(html: &str, page_url: &Url, scope: &UrlScope) -> Vec<Url> {
    match try_extract_links(html, page_url, scope) {
        Ok(links) => links,
        Err(e) => {
            tracing::warn!("Link extraction failed for {}: {}", page_url, e);
            Vec::new()
        }
    }
}

/// Fallible form of [`extract_links`]
pub fn try_extract_links(
    html: &str,
    page_url: &Url,
    scope: &UrlScope,
) -> Result<Vec<Url>, ExtractionError> {
    if page_url.cannot_be_a_base() {
        return Err(ExtractionError::InvalidBase(page_url.to_string()));
    }

    let document = Html::parse_document(html);
    let base_url = document_base(&document, page_url);
    let self_key = normalize_parsed(page_url).ok();

    let anchor_selector =
        Selector::parse("a[href], area[href]").map_err(|e| ExtractionError::Selector(e.to_string()))?;

    let mut seen: HashSet<Url> = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&anchor_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Some(absolute) = resolve_link(href, &base_url) else {
            continue;
        };

        if !scope.contains(&absolute) {
            continue;
        }
        let absolute = scope.align(&absolute);

        let Ok(key) = normalize_parsed(&absolute) else {
            continue;
        };

        if self_key.as_ref() == Some(&key) {
            continue;
        }

        if seen.insert(key) {
            links.push(absolute);
        }
    }

    tracing::trace!("Extracted {} in-scope links from {}", links.len(), page_url);
    Ok(links)
}

/// Resolves the effective base URL (`<base href>` or the page URL)
pub(crate) fn document_base(document: &Html, page_url: &Url) -> Url {
    let Ok(base_selector) = Selector::parse("base[href]") else {
        return page_url.clone();
    };

    document
        .select(&base_selector)
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
        .unwrap_or_else(|| page_url.clone())
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only references
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    if absolute.scheme() == "http" || absolute.scheme() == "https" {
        Some(strip_fragment(&absolute))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> Url {
        Url::parse("https://example.com/docs/").unwrap()
    }

    fn scope() -> UrlScope {
        UrlScope::from_root(&root()).unwrap()
    }

    fn links(html: &str) -> Vec<String> {
        extract_links(html, &root(), &scope())
            .into_iter()
            .map(|u| u.to_string())
            .collect()
    }

    #[test]
    fn test_filters_external_host() {
        let html = r#"
            <html><body>
                <a href="/docs/a">A</a>
                <a href="/docs/b">B</a>
                <a href="https://other.com/x">X</a>
            </body></html>
        "#;
        assert_eq!(
            links(html),
            vec!["https://example.com/docs/a", "https://example.com/docs/b"]
        );
    }

    #[test]
    fn test_resolves_relative_links() {
        let html = r#"<a href="guide/intro">Intro</a><a href="../docs/api">API</a>"#;
        assert_eq!(
            links(html),
            vec![
                "https://example.com/docs/guide/intro",
                "https://example.com/docs/api"
            ]
        );
    }

    #[test]
    fn test_out_of_prefix_filtered() {
        let html = r#"<a href="/blog/post">Blog</a><a href="/docs-old/a">Old</a>"#;
        assert!(links(html).is_empty());
    }

    #[test]
    fn test_strips_fragments_and_dedups() {
        let html = r##"
            <a href="/docs/a#one">A1</a>
            <a href="/docs/a#two">A2</a>
            <a href="/docs/a/">A3</a>
            <a href="/docs/b">B</a>
        "##;
        assert_eq!(
            links(html),
            vec!["https://example.com/docs/a", "https://example.com/docs/b"]
        );
    }

    #[test]
    fn test_drops_self_links() {
        let html = r##"<a href="/docs/">Home</a><a href="#top">Top</a><a href="/docs/x">X</a>"##;
        assert_eq!(links(html), vec!["https://example.com/docs/x"]);
    }

    #[test]
    fn test_skips_special_schemes() {
        let html = r#"
            <a href="javascript:void(0)">JS</a>
            <a href="JavaScript:alert(1)">JS</a>
            <a href="mailto:test@example.com">Mail</a>
            <a href="tel:+1234567890">Call</a>
            <a href="data:text/html,<h1>x</h1>">Data</a>
        "#;
        assert!(links(html).is_empty());
    }

    #[test]
    fn test_skips_download_links() {
        let html = r#"<a href="/docs/manual" download>Download</a>"#;
        assert!(links(html).is_empty());
    }

    #[test]
    fn test_honours_base_href() {
        let html = r#"
            <html><head><base href="https://example.com/docs/v2/"></head>
            <body><a href="setup">Setup</a></body></html>
        "#;
        assert_eq!(links(html), vec!["https://example.com/docs/v2/setup"]);
    }

    #[test]
    fn test_mixed_scheme_links_collapse() {
        let html = r#"<a href="http://example.com/docs/a">A</a><a href="https://example.com/docs/a">A</a>"#;
        assert_eq!(links(html), vec!["https://example.com/docs/a"]);
    }

    #[test]
    fn test_area_links() {
        let html = r#"<map><area href="/docs/map-target" /></map>"#;
        assert_eq!(links(html), vec!["https://example.com/docs/map-target"]);
    }

    #[test]
    fn test_keeps_document_order() {
        let html = r#"<a href="/docs/z">Z</a><a href="/docs/a">A</a><a href="/docs/m">M</a>"#;
        assert_eq!(
            links(html),
            vec![
                "https://example.com/docs/z",
                "https://example.com/docs/a",
                "https://example.com/docs/m"
            ]
        );
    }

    #[test]
    fn test_malformed_html_yields_no_links() {
        assert!(links("<<<>>> <a href").is_empty());
        assert!(links("").is_empty());
    }

    #[test]
    fn test_invalid_base_is_an_error() {
        let page = Url::parse("data:text/html,hello").unwrap();
        assert!(matches!(
            try_extract_links("<a href='/x'>x</a>", &page, &scope()),
            Err(ExtractionError::InvalidBase(_))
        ));
        assert!(extract_links("<a href='/x'>x</a>", &page, &scope()).is_empty());
    }
}
