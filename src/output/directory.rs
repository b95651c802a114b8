//! One Markdown file per source URL
//!
//! Files live at `<output>/<host>/<path>.md`. The layout is a pure function
//! of the URL, so re-crawling a site overwrites the same files.

use crate::content::PageDocument;
use crate::output::markdown::generate_markdown_summary;
use crate::output::traits::{CrawlReport, OutputError, OutputResult, PageSink};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

pub const SUMMARY_JSON_FILE: &str = "crawl_summary.json";
pub const SUMMARY_MARKDOWN_FILE: &str = "crawl_summary.md";

/// Relative file path for a document URL
///
/// - the host (with `_<port>` for explicit ports) is the top directory
/// - an empty path, or one ending in `/`, maps to `index.md`
/// - a trailing `.html`/`.htm` extension is replaced by `.md`
/// - characters outside `[A-Za-z0-9._-]` become `_`
/// - a query adds the first 8 hex digits of its SHA-256 to the file name
///
/// # Example
///
/// ```
/// use docharvest::output::document_path;
/// use std::path::PathBuf;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/docs/guide/intro").unwrap();
/// assert_eq!(
///     document_path(&url),
///     PathBuf::from("example.com/docs/guide/intro.md")
/// );
/// ```
pub fn document_path(url: &Url) -> PathBuf {
    let mut host = sanitize(url.host_str().unwrap_or("unknown-host"));
    if let Some(port) = url.port() {
        host.push_str(&format!("_{}", port));
    }

    let mut path = PathBuf::from(host);

    let mut segments: Vec<String> = url
        .path_segments()
        .map(|s| s.map(sanitize).collect())
        .unwrap_or_default();

    match segments.last() {
        None => segments.push("index".to_string()),
        Some(last) if last.is_empty() => {
            segments.pop();
            segments.push("index".to_string());
        }
        Some(_) => {}
    }

    let mut file_stem = segments.pop().unwrap_or_else(|| "index".to_string());
    for ext in [".html", ".htm"] {
        if let Some(stripped) = file_stem.strip_suffix(ext) {
            if !stripped.is_empty() {
                file_stem = stripped.to_string();
            }
            break;
        }
    }

    if let Some(query) = url.query() {
        let digest = hex::encode(Sha256::digest(query.as_bytes()));
        file_stem.push('-');
        file_stem.push_str(&digest[..8]);
    }

    for segment in segments.into_iter().filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path.push(format!("{}.md", file_stem));
    path
}

fn sanitize(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match cleaned.as_str() {
        "." | ".." => "_".repeat(cleaned.len()),
        _ => cleaned,
    }
}

/// Writes documents under an output directory
pub struct MarkdownDirSink {
    root: PathBuf,
    written: u64,
}

impl MarkdownDirSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: 0,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of documents written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    fn write_file(path: &Path, contents: &str) -> OutputResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| OutputError::Write {
                path: parent.display().to_string(),
                source,
            })?;
        }
        fs::write(path, contents).map_err(|source| OutputError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

impl PageSink for MarkdownDirSink {
    fn persist(&mut self, document: &PageDocument) -> OutputResult<()> {
        let path = self.root.join(document_path(&document.source_url));
        Self::write_file(&path, &document.to_markdown_file())?;
        self.written += 1;
        tracing::debug!("Wrote {} to {}", document.source_url, path.display());
        Ok(())
    }

    /// Writes `crawl_summary.json` and `crawl_summary.md`
    fn finalize(&mut self, report: &CrawlReport) -> OutputResult<()> {
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| OutputError::Format(e.to_string()))?;
        Self::write_file(&self.root.join(SUMMARY_JSON_FILE), &json)?;
        generate_markdown_summary(report, &self.root.join(SUMMARY_MARKDOWN_FILE))?;
        tracing::info!("Crawl summary written to {}", self.root.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{RunState, StatusCounts};
    use chrono::Utc;
    use tempfile::TempDir;

    fn path_for(url: &str) -> String {
        document_path(&Url::parse(url).unwrap())
            .to_string_lossy()
            .replace('\\', "/")
    }

    #[test]
    fn test_paths() {
        assert_eq!(path_for("https://example.com/docs/a"), "example.com/docs/a.md");
        assert_eq!(path_for("https://example.com/"), "example.com/index.md");
        assert_eq!(path_for("https://example.com/docs/"), "example.com/docs/index.md");
        assert_eq!(
            path_for("https://example.com/docs/intro.html"),
            "example.com/docs/intro.md"
        );
        assert_eq!(
            path_for("http://localhost:8080/guide"),
            "localhost_8080/guide.md"
        );
    }

    #[test]
    fn test_unsafe_characters_are_replaced() {
        assert_eq!(
            path_for("https://example.com/docs/a%20b/c:d"),
            "example.com/docs/a_20b/c_d.md"
        );
    }

    #[test]
    fn test_query_adds_stable_hash() {
        let a = path_for("https://example.com/docs/page?v=1");
        let b = path_for("https://example.com/docs/page?v=2");
        assert!(a.starts_with("example.com/docs/page-"));
        assert!(a.ends_with(".md"));
        assert_ne!(a, b);
        assert_eq!(a, path_for("https://example.com/docs/page?v=1"));
    }

    #[test]
    fn test_persist_writes_front_matter() {
        let dir = TempDir::new().unwrap();
        let mut sink = MarkdownDirSink::new(dir.path());

        let doc = PageDocument::new(
            Url::parse("https://example.com/docs/a").unwrap(),
            "Page A".to_string(),
            "# Page A\n\nBody.".to_string(),
        );
        sink.persist(&doc).unwrap();

        let written = fs::read_to_string(dir.path().join("example.com/docs/a.md")).unwrap();
        assert!(written.starts_with("---\nsource_url: \"https://example.com/docs/a\"\n"));
        assert!(written.contains("fetched_at: "));
        assert!(written.ends_with("# Page A\n\nBody.\n"));
        assert_eq!(sink.written(), 1);
    }

    #[test]
    fn test_finalize_writes_summaries() {
        let dir = TempDir::new().unwrap();
        let mut sink = MarkdownDirSink::new(dir.path());
        let now = Utc::now();
        let report = CrawlReport {
            root_url: "https://example.com/docs".to_string(),
            outcome: RunState::Completed,
            run_id: None,
            started_at: now,
            finished_at: now,
            elapsed_seconds: 1.0,
            counts: StatusCounts::default(),
            documents_written: 0,
            visited_urls: Vec::new(),
            failed_urls: Vec::new(),
            abort_reason: None,
        };

        sink.finalize(&report).unwrap();

        let json = fs::read_to_string(dir.path().join(SUMMARY_JSON_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["outcome"], "completed");
        assert!(dir.path().join(SUMMARY_MARKDOWN_FILE).exists());
    }
}
