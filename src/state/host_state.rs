use std::time::{Duration, Instant};

/// Tracks the state of a host during crawling
///
/// This structure maintains the per-host information needed for politeness:
/// when the last request started and how many were made.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Number of requests started against this host in the current run
    pub request_count: u32,

    /// When the last request to this host was started
    pub last_request_time: Option<Instant>,
}

impl HostState {
    /// Creates a new HostState with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks if a request can be started against this host
    ///
    /// # Arguments
    ///
    /// * `min_delay` - The minimum gap between request starts
    /// * `now` - The current time instant
    ///
    /// # Returns
    ///
    /// * `true` - If a request can be made now
    /// * `false` - If the request should be delayed
    pub fn can_request(&self, min_delay: Duration, now: Instant) -> bool {
        self.time_until_next_request(min_delay, now).is_none()
    }

    /// Records that a request was started against this host
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, min_delay: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < min_delay {
            Some(min_delay - elapsed)
        } else {
            None
        }
    }
}
