//! Suppression of duplicate push deliveries.
//!
//! The push transport delivers at least once: reconnects replay recent
//! events, and the same member join can arrive twice within a second. Each
//! processed event registers a key; a second event for the same
//! `(kind, community, member)` arriving within the TTL is dropped.
//!
//! # Key Format
//!
//! `<kind>:<community>:<member>:<registered_at_millis>`
//!
//! Identifier segments have `\` and `:` escaped so that the
//! `(kind, community, member)` prefix is unambiguous.
//!
//! # Expiry
//!
//! Keys are swept lazily instead of by per-key timers: every access prunes
//! the community's expired keys, and [`EventDeduplicator::sweep`] prunes all
//! communities (the engine calls it on its periodic tick). An expired key
//! never blocks a later, legitimately distinct event.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::types::{CommunityId, UserId};

/// Default time a key suppresses repeats (10 seconds).
pub const DEFAULT_DEDUP_TTL_SECS: i64 = 10;

/// The kind of membership event being deduplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MemberJoin,
    MemberLeave,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MemberJoin => "member_join",
            EventKind::MemberLeave => "member_leave",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn escape_segment(segment: &str) -> String {
    segment.replace('\\', "\\\\").replace(':', "\\:")
}

/// A registered event key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupeKey(String);

impl DedupeKey {
    /// Creates the key for an event registered at `at`.
    pub fn new(kind: EventKind, community: &CommunityId, member: &UserId, at: DateTime<Utc>) -> Self {
        DedupeKey(format!(
            "{}{}",
            Self::prefix(kind, community, member),
            at.timestamp_millis()
        ))
    }

    /// The `(kind, community, member)` prefix shared by all keys for the
    /// same logical event.
    pub fn prefix(kind: EventKind, community: &CommunityId, member: &UserId) -> String {
        format!(
            "{}:{}:{}:",
            kind.as_str(),
            escape_segment(community.as_str()),
            escape_segment(member.as_str())
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type KeySets = HashMap<CommunityId, HashMap<DedupeKey, DateTime<Utc>>>;

/// Per-community sets of recently processed event keys.
///
/// Safe to share between concurrently running event tasks; the lock is never
/// held across an await point.
#[derive(Debug)]
pub struct EventDeduplicator {
    ttl: Duration,
    keys: Mutex<KeySets>,
}

impl Default for EventDeduplicator {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_DEDUP_TTL_SECS))
    }
}

impl EventDeduplicator {
    pub fn new(ttl: Duration) -> Self {
        EventDeduplicator {
            ttl,
            keys: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, KeySets> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` if the event should be processed, registering a key.
    /// Returns `false` if the same event was registered less than the TTL ago.
    pub fn should_process(&self, kind: EventKind, community: &CommunityId, member: &UserId) -> bool {
        self.should_process_at(kind, community, member, Utc::now())
    }

    /// [`should_process`](Self::should_process) with an explicit clock.
    pub fn should_process_at(
        &self,
        kind: EventKind,
        community: &CommunityId,
        member: &UserId,
        now: DateTime<Utc>,
    ) -> bool {
        let prefix = DedupeKey::prefix(kind, community, member);
        let cutoff = now - self.ttl;

        let mut keys = self.lock();
        let set = keys.entry(community.clone()).or_default();
        set.retain(|_, registered_at| *registered_at > cutoff);

        let newest = set
            .iter()
            .filter(|(key, _)| key.as_str().starts_with(&prefix))
            .map(|(_, registered_at)| *registered_at)
            .max();

        if let Some(registered_at) = newest {
            if now - registered_at < self.ttl {
                trace!(
                    community = %community,
                    member = %member,
                    kind = %kind,
                    "Dropping duplicate event"
                );
                return false;
            }
        }

        set.insert(DedupeKey::new(kind, community, member, now), now);
        true
    }

    /// Drops expired keys in every community and forgets empty communities.
    ///
    /// Returns the number of keys removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.ttl;
        let mut keys = self.lock();

        let mut removed = 0;
        for set in keys.values_mut() {
            let before = set.len();
            set.retain(|_, registered_at| *registered_at > cutoff);
            removed += before - set.len();
        }
        keys.retain(|_, set| !set.is_empty());
        removed
    }

    /// Drops every key for a community.
    pub fn forget_community(&self, community: &CommunityId) {
        self.lock().remove(community);
    }

    /// Total number of live keys across all communities.
    pub fn len(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
