//! Markdown summary generation
//!
//! This module generates the human-readable crawl summary, including
//! counts, visited pages and failed URLs with their error kinds.

use crate::output::traits::{CrawlReport, OutputError, OutputResult};
use std::fs;
use std::path::Path;

/// Number of visited URLs listed before the list is truncated
const MAX_LISTED_VISITED: usize = 200;

/// Writes a markdown summary of a crawl report
///
/// # Arguments
///
/// * `report` - The crawl report
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(report: &CrawlReport, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(report);
    fs::write(output_path, markdown).map_err(|source| OutputError::Write {
        path: output_path.display().to_string(),
        source,
    })
}

/// Formats a crawl report as markdown
pub fn format_markdown_summary(report: &CrawlReport) -> String {
    let mut md = String::new();

    md.push_str("# Crawl Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Root URL**: {}\n", report.root_url));
    if let Some(run_id) = report.run_id {
        md.push_str(&format!("- **Run ID**: {}\n", run_id));
    }
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", report.finished_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Duration**: {:.1} seconds\n",
        report.elapsed_seconds
    ));
    md.push_str(&format!("- **Outcome**: {}\n", report.outcome));
    if let Some(reason) = &report.abort_reason {
        md.push_str(&format!("- **Abort Reason**: {}\n", reason));
    }
    md.push('\n');

    // Counts
    md.push_str("## URL Status Breakdown\n\n");
    md.push_str("| Status | Count |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!("| Done | {} |\n", report.counts.done));
    md.push_str(&format!("| Failed | {} |\n", report.counts.failed));
    md.push_str(&format!("| Pending | {} |\n", report.counts.pending));
    md.push_str(&format!("| In Flight | {} |\n", report.counts.in_flight));
    md.push_str(&format!("| **Total** | {} |\n\n", report.counts.total()));
    md.push_str(&format!(
        "- **Documents Written**: {}\n",
        report.documents_written
    ));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        report.success_rate()
    ));

    // Failed URLs
    if !report.failed_urls.is_empty() {
        md.push_str("## Failed URLs\n\n");
        md.push_str("| URL | Error Kind | Message |\n");
        md.push_str("|-----|------------|---------|\n");
        for failed in &report.failed_urls {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                failed.url,
                failed.kind,
                failed.message.replace('|', "\\|")
            ));
        }
        md.push('\n');
    }

    // Visited URLs
    if !report.visited_urls.is_empty() {
        md.push_str("## Visited URLs\n\n");
        for url in report.visited_urls.iter().take(MAX_LISTED_VISITED) {
            md.push_str(&format!("- {}\n", url));
        }
        if report.visited_urls.len() > MAX_LISTED_VISITED {
            md.push_str(&format!(
                "\n... and {} more\n",
                report.visited_urls.len() - MAX_LISTED_VISITED
            ));
        }
        md.push('\n');
    }

    md
}
