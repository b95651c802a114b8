//! Statistics generation from the crawl ledger
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::state::StatusCounts;
use crate::storage::{RunRecord, Storage, StorageResult};
use std::collections::BTreeMap;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Count of records by status
    pub counts: StatusCounts,

    /// Failed records by error kind
    pub error_summary: BTreeMap<String, u64>,

    /// Records by depth
    pub depth_breakdown: BTreeMap<u32, u64>,
}

impl CrawlStatistics {
    /// Share of finished records that are done, as a percentage
    pub fn success_rate(&self) -> f64 {
        let finished = self.counts.done + self.counts.failed;
        if finished == 0 {
            return 0.0;
        }
        (self.counts.done as f64 / finished as f64) * 100.0
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<CrawlStatistics> {
    Ok(CrawlStatistics {
        latest_run: storage.get_latest_run()?,
        counts: storage.status_counts()?,
        error_summary: storage.get_error_summary()?,
        depth_breakdown: storage.get_depth_breakdown()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  ID: {}", run.id);
            println!("  Root URL: {}", run.root_url);
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Status: {}", run.status);
            if run.was_interrupted() {
                println!("  (interrupted; use --resume to continue)");
            }
        }
        None => println!("No runs recorded."),
    }
    println!();

    let total = stats.counts.total();
    println!("URLs by Status:");
    for (label, count) in [
        ("done", stats.counts.done),
        ("failed", stats.counts.failed),
        ("pending", stats.counts.pending),
        ("in_flight", stats.counts.in_flight),
    ] {
        let percentage = if total > 0 {
            (count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", label, count, percentage);
    }
    println!("  total: {}", total);
    println!();

    if !stats.error_summary.is_empty() {
        println!("Error Summary:");
        let mut error_counts: Vec<_> = stats.error_summary.iter().collect();
        error_counts.sort_by(|a, b| b.1.cmp(a.1));

        for (kind, count) in error_counts {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    if !stats.depth_breakdown.is_empty() {
        println!("URLs by Depth:");
        for (depth, count) in &stats.depth_breakdown {
            println!("  {}: {}", depth, count);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} finished URLs)",
        stats.success_rate(),
        stats.counts.done,
        stats.counts.done + stats.counts.failed
    );
}
