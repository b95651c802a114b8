//! The crawl frontier: discovered URLs, their states and traversal order
//!
//! The frontier is the single owner of every URL record. The coordinator
//! task is the only caller, so the dedup check-and-insert in
//! [`Frontier::enqueue`] can never race with another enqueue.

use crate::state::{ErrorKind, StatusCounts, UrlRecord, UrlStatus};
use crate::url::{normalize_parsed, strip_fragment};
use crate::{HarvestError, Result};
use std::collections::{HashMap, VecDeque};
use url::Url;

/// How a run treats what an earlier run left in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Forget everything and start from the root
    Fresh,

    /// Continue an interrupted run: pending and in-flight URLs are fetched,
    /// done and failed URLs are kept as they are
    Resume,

    /// Like `Resume`, but failed URLs are fetched again as well
    RetryFailed,
}

/// Result of [`Frontier::enqueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// A new pending record was created
    Added,

    /// The URL (after normalization) is already known
    Duplicate,

    /// The depth exceeds the configured maximum
    TooDeep,

    /// The URL could not be normalized
    Invalid,
}

/// Result of [`Frontier::register_redirect`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// The final URL normalizes to the requested one
    Same,

    /// The final URL was new; later links to it count as duplicates
    Alias(String),

    /// The final URL already has its own record (key given)
    Known(String),
}

/// Breadth-first frontier with a dedup map
#[derive(Debug)]
pub struct Frontier {
    max_depth: u32,
    records: HashMap<String, UrlRecord>,
    queue: VecDeque<String>,

    /// Redirect targets, mapped to the record that was fetched for them
    aliases: HashMap<String, String>,
    next_seq: u64,
    in_flight: usize,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new(max_depth: u32) -> Self {
        Self {
            max_depth,
            records: HashMap::new(),
            queue: VecDeque::new(),
            aliases: HashMap::new(),
            next_seq: 0,
            in_flight: 0,
        }
    }

    /// Rebuilds a frontier from ledger records
    ///
    /// In-flight records belonged to fetches that never finished and go back
    /// to pending. With [`StartMode::RetryFailed`] failed records do too.
    /// Pending records deeper than `max_depth` (possible when the limit was
    /// lowered between runs) are left out. Discovery order is preserved.
    pub fn restore(max_depth: u32, records: Vec<UrlRecord>, mode: StartMode) -> Self {
        let mut frontier = Self::new(max_depth);
        if mode == StartMode::Fresh {
            return frontier;
        }

        let mut records = records;
        records.sort_by_key(|r| r.seq);

        for mut record in records {
            let requeue = match record.status {
                UrlStatus::Pending | UrlStatus::InFlight => true,
                UrlStatus::Failed => mode == StartMode::RetryFailed,
                UrlStatus::Done => false,
            };

            if requeue {
                if record.depth > max_depth {
                    tracing::debug!(
                        "Dropping {} from restored frontier: depth {} > {}",
                        record.url,
                        record.depth,
                        max_depth
                    );
                    continue;
                }
                record.status = UrlStatus::Pending;
                record.error = None;
                frontier.queue.push_back(record.url.to_string());
            }

            frontier.next_seq = frontier.next_seq.max(record.seq + 1);
            frontier.records.insert(record.url.to_string(), record);
        }

        tracing::info!(
            "Restored {} URL records ({} pending)",
            frontier.records.len(),
            frontier.queue.len()
        );
        frontier
    }

    /// Adds a URL unless it is already known or too deep
    ///
    /// # Arguments
    ///
    /// * `url` - The discovered URL; it is normalized to form the dedup key
    /// * `depth` - Link distance from the root
    /// * `discovered_from` - Key of the page the link was found on
    pub fn enqueue(&mut self, url: &Url, depth: u32, discovered_from: Option<&str>) -> Enqueued {
        if depth > self.max_depth {
            return Enqueued::TooDeep;
        }

        let normalized = match normalize_parsed(url) {
            Ok(u) => u,
            Err(e) => {
                tracing::debug!("Not enqueuing {}: {}", url, e);
                return Enqueued::Invalid;
            }
        };

        let key = normalized.to_string();
        if self.records.contains_key(&key) || self.aliases.contains_key(&key) {
            return Enqueued::Duplicate;
        }

        let record = UrlRecord::new(
            normalized,
            strip_fragment(url),
            depth,
            discovered_from.map(str::to_string),
            self.next_seq,
        );
        self.next_seq += 1;
        self.queue.push_back(key.clone());
        self.records.insert(key, record);
        Enqueued::Added
    }

    /// Takes the oldest pending URL and marks it in-flight
    pub fn next(&mut self) -> Option<UrlRecord> {
        self.next_matching(|_| true)
    }

    /// Takes the oldest pending URL accepted by `ready` and marks it in-flight
    ///
    /// Pending URLs that are skipped keep their place in the queue.
    pub fn next_matching<F>(&mut self, mut ready: F) -> Option<UrlRecord>
    where
        F: FnMut(&UrlRecord) -> bool,
    {
        let records = &self.records;
        let position = self
            .queue
            .iter()
            .position(|key| records.get(key).map_or(false, &mut ready))?;
        let key = self.queue.remove(position)?;

        let record = self.records.get_mut(&key)?;
        record.status = UrlStatus::InFlight;
        record.attempts += 1;
        self.in_flight += 1;
        Some(record.clone())
    }

    /// Marks an in-flight URL as done
    pub fn mark_done(&mut self, key: &str) -> Result<()> {
        self.transition(key, UrlStatus::Done)?;
        Ok(())
    }

    /// Marks an in-flight URL as failed with the given classification
    pub fn mark_failed(&mut self, key: &str, kind: ErrorKind, message: impl Into<String>) -> Result<()> {
        let record = self.transition(key, UrlStatus::Failed)?;
        record.error = Some((kind, message.into()));
        Ok(())
    }

    fn transition(&mut self, key: &str, to: UrlStatus) -> Result<&mut UrlRecord> {
        let record = self
            .records
            .get_mut(key)
            .ok_or_else(|| HarvestError::UnknownUrl(key.to_string()))?;

        if !record.status.can_transition_to(to) {
            return Err(HarvestError::InvalidTransition {
                url: key.to_string(),
                from: record.status,
                to,
            });
        }

        if record.status == UrlStatus::InFlight {
            self.in_flight -= 1;
        }
        record.status = to;
        Ok(record)
    }

    /// Records the final URL a fetch of `key` ended up on
    ///
    /// A new final URL becomes an alias of `key` so that later links to it
    /// are treated as duplicates.
    pub fn register_redirect(&mut self, key: &str, final_url: &Url) -> Redirect {
        let final_key = match normalize_parsed(final_url) {
            Ok(u) => u.to_string(),
            Err(_) => return Redirect::Same,
        };

        if final_key == key {
            return Redirect::Same;
        }

        if self.records.contains_key(&final_key) {
            return Redirect::Known(final_key);
        }
        if let Some(owner) = self.aliases.get(&final_key) {
            if owner != key {
                return Redirect::Known(owner.clone());
            }
            return Redirect::Alias(final_key);
        }

        self.aliases.insert(final_key.clone(), key.to_string());
        Redirect::Alias(final_key)
    }

    /// True when nothing is pending and nothing is in flight
    pub fn is_finished(&self) -> bool {
        self.queue.is_empty() && self.in_flight == 0
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Pending records in queue order
    pub fn pending(&self) -> impl Iterator<Item = &UrlRecord> {
        self.queue.iter().filter_map(|key| self.records.get(key))
    }

    pub fn get(&self, key: &str) -> Option<&UrlRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for record in self.records.values() {
            counts.add(record.status);
        }
        counts
    }

    /// Failed records in discovery order
    pub fn failed(&self) -> Vec<&UrlRecord> {
        let mut failed: Vec<_> = self
            .records
            .values()
            .filter(|r| r.status == UrlStatus::Failed)
            .collect();
        failed.sort_by_key(|r| r.seq);
        failed
    }

    /// All records in discovery order
    pub fn records(&self) -> Vec<&UrlRecord> {
        let mut all: Vec<_> = self.records.values().collect();
        all.sort_by_key(|r| r.seq);
        all
    }
}
