//! Engine tunables.

use std::time::Duration;

use crate::dedupe::DEFAULT_DEDUP_TTL_SECS;
use crate::lifecycle::DEFAULT_FAKE_THRESHOLD_MINS;

/// Default interval between periodic snapshot refreshes (10 minutes).
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 600;

/// Timing knobs for an [`Orchestrator`](super::Orchestrator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How often every cached community is re-snapshotted.
    ///
    /// Catches invitation changes whose events were missed. Default: 10 minutes.
    pub refresh_interval: Duration,

    /// How long a processed join/leave suppresses repeats. Default: 10 seconds.
    pub dedup_ttl: chrono::Duration,

    /// Minimum stay for a join to count as genuine. Default: 30 minutes.
    pub fake_threshold: chrono::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            dedup_ttl: chrono::Duration::seconds(DEFAULT_DEDUP_TTL_SECS),
            fake_threshold: chrono::Duration::minutes(DEFAULT_FAKE_THRESHOLD_MINS),
        }
    }
}

impl EngineConfig {
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_dedup_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.dedup_ttl = ttl;
        self
    }

    pub fn with_fake_threshold(mut self, threshold: chrono::Duration) -> Self {
        self.fake_threshold = threshold;
        self
    }
}
