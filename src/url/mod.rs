//! URL handling module for docharvest
//!
//! This module provides URL normalization, host keys for politeness, host
//! pattern matching, and the crawl scope predicate.

mod domain;
mod matcher;
mod normalize;

use crate::{UrlError, UrlResult};
use url::Url;

// Re-export main functions
pub use domain::host_key;
pub use matcher::matches_host;
pub use normalize::{normalize_parsed, normalize_url, strip_fragment};

/// File extensions that never hold documentation pages
pub const DEFAULT_SKIP_EXTENSIONS: &[&str] = &[
    "7z", "avi", "css", "exe", "gif", "gz", "ico", "jpeg", "jpg", "js", "mov", "mp3", "mp4",
    "pdf", "png", "svg", "tar", "tgz", "ttf", "webm", "webp", "woff", "woff2", "xml", "zip",
];

/// Decides which URLs belong to a crawl
///
/// A URL is in scope when all of the following hold:
/// - its scheme is `http` or `https`
/// - its host is the root's host, or matches one of the extra host patterns
/// - its normalized path equals the root's path prefix or lies below it
///   (segment-aware: `/docs` covers `/docs/a` but not `/docs-old`)
/// - its path is not below any excluded prefix
/// - its last path segment does not carry a skipped file extension
///
/// Links to the root host are aligned to the root's scheme before they are
/// keyed, so `http://` and `https://` forms of a page share one record.
#[derive(Debug, Clone)]
pub struct UrlScope {
    scheme: String,
    host: String,
    extra_hosts: Vec<String>,
    path_prefix: String,
    exclude_paths: Vec<String>,
    skip_extensions: Vec<String>,
}

impl UrlScope {
    /// Builds the scope implied by a crawl root
    ///
    /// The path prefix is the root's normalized path. When the last segment
    /// looks like a file (`/docs/index.html`), its parent directory is used.
    pub fn from_root(root: &Url) -> UrlResult<Self> {
        let normalized = normalize_parsed(root)?;
        let host = host_key(&normalized).ok_or(UrlError::MissingHost)?;

        let path = normalized.path();
        let path_prefix = match path.rsplit_once('/') {
            Some((parent, last)) if last.contains('.') => {
                if parent.is_empty() {
                    "/".to_string()
                } else {
                    parent.to_string()
                }
            }
            _ => path.to_string(),
        };

        Ok(Self {
            scheme: normalized.scheme().to_string(),
            host,
            extra_hosts: Vec::new(),
            path_prefix,
            exclude_paths: Vec::new(),
            skip_extensions: DEFAULT_SKIP_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        })
    }

    /// Allows additional hosts (exact or `*.` wildcard patterns)
    pub fn with_extra_hosts(mut self, patterns: Vec<String>) -> Self {
        self.extra_hosts = patterns;
        self
    }

    /// Excludes paths below the given prefixes
    pub fn with_excluded_paths(mut self, prefixes: Vec<String>) -> Self {
        self.exclude_paths = prefixes
            .into_iter()
            .map(|p| {
                let trimmed = p.trim_end_matches('/');
                if trimmed.starts_with('/') {
                    trimmed.to_string()
                } else {
                    format!("/{}", trimmed)
                }
            })
            .collect();
        self
    }

    /// Replaces the list of skipped file extensions
    pub fn with_skip_extensions(mut self, extensions: Vec<String>) -> Self {
        self.skip_extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// The root host key (host plus explicit port)
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The root's scheme
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Rewrites a web URL on the root host to the root's scheme
    ///
    /// URLs on other hosts, and URLs whose scheme cannot be switched, are
    /// returned unchanged.
    pub fn align(&self, url: &Url) -> Url {
        let same_host = host_key(url).is_some_and(|key| key == self.host);
        if !same_host || url.scheme() == self.scheme {
            return url.clone();
        }

        let mut aligned = url.clone();
        match aligned.set_scheme(&self.scheme) {
            Ok(()) => aligned,
            Err(()) => url.clone(),
        }
    }

    /// The path prefix every in-scope URL lies under
    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    /// Returns true if the URL belongs to this crawl
    pub fn contains(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }

        let Some(key) = host_key(url) else {
            return false;
        };
        let host_ok = key == self.host
            || url
                .host_str()
                .is_some_and(|h| self.extra_hosts.iter().any(|p| matches_host(p, h)));
        if !host_ok {
            return false;
        }

        let path = match normalize_parsed(url) {
            Ok(normalized) => normalized.path().to_string(),
            Err(_) => return false,
        };

        if !is_under(&path, &self.path_prefix) {
            return false;
        }

        if self.exclude_paths.iter().any(|p| is_under(&path, p)) {
            return false;
        }

        !self.has_skipped_extension(&path)
    }

    fn has_skipped_extension(&self, path: &str) -> bool {
        let last = path.rsplit('/').next().unwrap_or_default();
        match last.rsplit_once('.') {
            Some((_, ext)) => {
                let ext = ext.to_ascii_lowercase();
                self.skip_extensions.iter().any(|s| *s == ext)
            }
            None => false,
        }
    }
}

/// Segment-aware path prefix check
fn is_under(path: &str, prefix: &str) -> bool {
    if prefix == "/" || prefix.is_empty() {
        return true;
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
