//! Per-inviter fake-invite counters for one community.
//!
//! The table is small (one row per inviter) so it is rewritten whole on every
//! increment using [`write_json_atomic`]. Counters never decrease.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::atomic::{try_read_json, write_json_atomic};
use super::{PersistenceError, Result};
use crate::types::{CommunityId, FakeInviteCounter};

/// Current on-disk schema version of the counters file.
pub const COUNTERS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCounters {
    schema_version: u32,
    counters: Vec<FakeInviteCounter>,
}

/// In-memory view of a community's fake-invite counters, backed by a file.
#[derive(Debug)]
pub struct FakeInviteTable {
    path: PathBuf,
    community: CommunityId,
    counters: BTreeMap<String, FakeInviteCounter>,
}

impl FakeInviteTable {
    /// Loads the table from `path`; a missing file yields an empty table.
    pub fn load(path: impl Into<PathBuf>, community: CommunityId) -> Result<Self> {
        let path = path.into();
        let persisted: Option<PersistedCounters> = try_read_json(&path)?;

        if let Some(p) = &persisted {
            if p.schema_version != COUNTERS_SCHEMA_VERSION {
                return Err(PersistenceError::SchemaMismatch {
                    expected: COUNTERS_SCHEMA_VERSION,
                    got: p.schema_version,
                });
            }
        }

        let counters = persisted
            .map(|p| p.counters)
            .unwrap_or_default()
            .into_iter()
            .map(|c| (c.inviter_display_name.clone(), c))
            .collect();

        Ok(FakeInviteTable {
            path,
            community,
            counters,
        })
    }

    /// Adds one to the inviter's counter, creating it if needed, and persists.
    ///
    /// The in-memory table only changes once the file write succeeded.
    /// Returns the new count.
    pub fn increment(&mut self, inviter_display_name: &str, now: DateTime<Utc>) -> Result<u64> {
        let mut updated = match self.counters.get(inviter_display_name) {
            Some(existing) => existing.clone(),
            None => FakeInviteCounter {
                community_id: self.community.clone(),
                inviter_display_name: inviter_display_name.to_string(),
                count: 0,
                created_at: now,
                updated_at: now,
            },
        };
        updated.count += 1;
        updated.updated_at = now;

        let mut next = self.counters.clone();
        next.insert(inviter_display_name.to_string(), updated);
        self.persist(&next)?;

        let count = next
            .get(inviter_display_name)
            .map(|c| c.count)
            .unwrap_or_default();
        self.counters = next;
        Ok(count)
    }

    fn persist(&self, counters: &BTreeMap<String, FakeInviteCounter>) -> Result<()> {
        let persisted = PersistedCounters {
            schema_version: COUNTERS_SCHEMA_VERSION,
            counters: counters.values().cloned().collect(),
        };
        write_json_atomic(&self.path, &persisted)
    }

    pub fn get(&self, inviter_display_name: &str) -> u64 {
        self.counters
            .get(inviter_display_name)
            .map(|c| c.count)
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counters.values().map(|c| c.count).sum()
    }

    pub fn counters(&self) -> impl Iterator<Item = &FakeInviteCounter> {
        self.counters.values()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn increment_creates_and_bumps() {
        let dir = tempdir().unwrap();
        let mut table =
            FakeInviteTable::load(dir.path().join("fake_invites.json"), "c1".into()).unwrap();

        assert_eq!(table.increment("alice", Utc::now()).unwrap(), 1);
        assert_eq!(table.increment("alice", Utc::now()).unwrap(), 2);
        assert_eq!(table.increment("bob", Utc::now()).unwrap(), 1);
        assert_eq!(table.get("alice"), 2);
        assert_eq!(table.get("carol"), 0);
        assert_eq!(table.total(), 3);
    }

    #[test]
    fn counts_survive_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake_invites.json");

        {
            let mut table = FakeInviteTable::load(&path, "c1".into()).unwrap();
            table.increment("alice", Utc::now()).unwrap();
            table.increment("alice", Utc::now()).unwrap();
        }

        let table = FakeInviteTable::load(&path, "c1".into()).unwrap();
        assert_eq!(table.get("alice"), 2);
    }

    #[test]
    fn created_at_is_kept_across_increments() {
        let dir = tempdir().unwrap();
        let mut table =
            FakeInviteTable::load(dir.path().join("fake_invites.json"), "c1".into()).unwrap();

        let first = DateTime::<Utc>::from_timestamp(1_000, 0).unwrap();
        let second = DateTime::<Utc>::from_timestamp(2_000, 0).unwrap();
        table.increment("alice", first).unwrap();
        table.increment("alice", second).unwrap();

        let counter = table.counters().next().unwrap();
        assert_eq!(counter.created_at, first);
        assert_eq!(counter.updated_at, second);
    }

    #[test]
    fn failed_write_leaves_memory_unchanged() {
        let dir = tempdir().unwrap();
        // A directory where the file should be makes the rename fail.
        let path = dir.path().join("fake_invites.json");
        std::fs::create_dir_all(path.join("blocker")).unwrap();

        let mut table = FakeInviteTable {
            path,
            community: "c1".into(),
            counters: BTreeMap::new(),
        };
        assert!(table.increment("alice", Utc::now()).is_err());
        assert_eq!(table.get("alice"), 0);
    }

    #[test]
    fn schema_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake_invites.json");
        std::fs::write(&path, br#"{"schema_version": 99, "counters": []}"#).unwrap();

        let err = FakeInviteTable::load(&path, "c1".into()).unwrap_err();
        assert!(matches!(
            err,
            crate::persistence::PersistenceError::SchemaMismatch { got: 99, .. }
        ));
    }
}
