//! Per-host request pacing
//!
//! Every host gets a minimum gap between request starts. The coordinator
//! asks which pending URL may start now, and how long to sleep when none
//! can.

use crate::state::HostState;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Wait used when nothing is known about the pending hosts yet
const DEFAULT_POLL: Duration = Duration::from_millis(100);

/// Added to computed waits so the host is definitely ready on wake-up
const WAKE_SLACK: Duration = Duration::from_millis(10);

/// Tracks request timing for every host of a crawl
#[derive(Debug)]
pub struct Politeness {
    min_delay: Duration,
    hosts: HashMap<String, HostState>,
}

impl Politeness {
    /// Creates a tracker enforcing `min_delay` between request starts per host
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            hosts: HashMap::new(),
        }
    }

    /// Returns true if a request to `host` may start at `now`
    pub fn is_ready(&self, host: &str, now: Instant) -> bool {
        self.hosts
            .get(host)
            .map_or(true, |state| state.can_request(self.min_delay, now))
    }

    /// Records that a request to `host` started at `now`
    pub fn record_request(&mut self, host: &str, now: Instant) {
        self.hosts
            .entry(host.to_string())
            .or_insert_with(HostState::new)
            .record_request(now);
    }

    /// Calculates how long to wait before any of `hosts` is ready
    ///
    /// # Arguments
    ///
    /// * `hosts` - Hosts of the pending URLs
    /// * `now` - The current time instant
    ///
    /// # Returns
    ///
    /// The shortest wait among the given hosts. A host with no recorded
    /// request is ready immediately.
    pub fn wait_time<'a, I>(&self, hosts: I, now: Instant) -> Duration
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut min_wait: Option<Duration> = None;

        for host in hosts {
            match self
                .hosts
                .get(host)
                .and_then(|state| state.time_until_next_request(self.min_delay, now))
            {
                Some(wait) => {
                    min_wait = Some(min_wait.map_or(wait, |current| current.min(wait)));
                }
                None => return Duration::ZERO,
            }
        }

        min_wait.map_or(DEFAULT_POLL, |wait| wait + WAKE_SLACK)
    }

    /// Number of requests started against `host`
    pub fn request_count(&self, host: &str) -> u32 {
        self.hosts.get(host).map_or(0, |state| state.request_count)
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }
}
