//! Classification of leaves as fake joins.

use chrono::{DateTime, Duration, Utc};

/// Default minimum stay for a join to count as genuine (30 minutes).
pub const DEFAULT_FAKE_THRESHOLD_MINS: i64 = 30;

/// Outcome of classifying a leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// The member left before the threshold elapsed.
    pub is_fake: bool,

    /// When the member joined, if any source knew.
    pub joined_at: Option<DateTime<Utc>>,

    /// `None` when the join time is indeterminate.
    pub time_in_server: Option<Duration>,
}

impl Classification {
    /// A leave whose join time nobody recorded. Never fake.
    pub fn indeterminate() -> Self {
        Classification {
            is_fake: false,
            joined_at: None,
            time_in_server: None,
        }
    }
}

/// Candidate join times for a leaving member, in fallback order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinTimeSources {
    /// Recorded by this process when the join was handled.
    pub index: Option<DateTime<Utc>>,

    /// Reported by the platform on the leave payload.
    pub platform: Option<DateTime<Utc>>,

    /// From the member's latest attribution row.
    pub record: Option<DateTime<Utc>>,
}

impl JoinTimeSources {
    /// The first known join time.
    pub fn resolve(&self) -> Option<DateTime<Utc>> {
        self.index.or(self.platform).or(self.record)
    }
}

/// Decides whether a leave followed a join too closely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeJoinDetector {
    threshold: Duration,
}

impl Default for FakeJoinDetector {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_FAKE_THRESHOLD_MINS))
    }
}

impl FakeJoinDetector {
    pub fn new(threshold: Duration) -> Self {
        FakeJoinDetector { threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Fake iff the member stayed strictly less than the threshold.
    pub fn classify(&self, joined_at: DateTime<Utc>, now: DateTime<Utc>) -> Classification {
        let time_in_server = now - joined_at;
        Classification {
            is_fake: time_in_server < self.threshold,
            joined_at: Some(joined_at),
            time_in_server: Some(time_in_server),
        }
    }

    /// Classifies using the first available join time.
    pub fn classify_leave(&self, sources: JoinTimeSources, now: DateTime<Utc>) -> Classification {
        match sources.resolve() {
            Some(joined_at) => self.classify(joined_at, now),
            None => Classification::indeterminate(),
        }
    }
}
