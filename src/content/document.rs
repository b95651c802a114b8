use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

/// One normalized documentation page
///
/// Produced once per successfully fetched URL and immutable afterwards;
/// ownership passes to the page sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageDocument {
    /// Normalized URL the page was fetched from
    pub source_url: Url,
    pub title: String,
    pub markdown_body: String,
    pub fetched_at: DateTime<Utc>,
}

impl PageDocument {
    pub fn new(source_url: Url, title: String, markdown_body: String) -> Self {
        Self {
            source_url,
            title,
            markdown_body,
            fetched_at: Utc::now(),
        }
    }

    /// Renders the document as a Markdown file with YAML front-matter
    ///
    /// ```text
    /// ---
    /// source_url: "https://example.com/docs/a"
    /// title: "Page title"
    /// fetched_at: "2024-01-01T00:00:00Z"
    /// ---
    ///
    /// <markdown body>
    /// ```
    pub fn to_markdown_file(&self) -> String {
        format!(
            "---\nsource_url: {}\ntitle: {}\nfetched_at: {}\n---\n\n{}\n",
            yaml_string(self.source_url.as_str()),
            yaml_string(&self.title),
            yaml_string(&self.fetched_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
            self.markdown_body
        )
    }
}

/// Double-quoted YAML scalar
///
/// JSON string syntax is a subset of YAML's double-quoted style.
fn yaml_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| String::from("\"\""))
}
