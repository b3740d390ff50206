//! Durable per-community attribution ledger.
//!
//! # File Layout
//!
//! ```text
//! <state_dir>/<community_id>/
//!   attributions.log    # append-only AttributionRecord rows (JSON Lines)
//!   fake_invites.json   # per-inviter fake-invite counters
//! ```
//!
//! A community's files are opened lazily on first use. Opening replays the
//! log and rebuilds two in-memory indexes: the latest row per member and the
//! number of attributed joins per inviter.
//!
//! # Locking
//!
//! Each community's ledger sits behind its own mutex. The store-wide map is
//! locked only long enough to find or insert that slot, so disk I/O for one
//! community never waits on another. Every operation here blocks on file I/O;
//! async callers go through `tokio::task::spawn_blocking`.
//!
//! # Failure Policy
//!
//! The public write operations (`record_join`, `increment_fake_invite_count`)
//! never fail the caller: storage errors are logged and the event pipeline
//! carries on. The `try_` variants expose the error for tests and tooling.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, error, info};

use super::counters::FakeInviteTable;
use super::log::AttributionLog;
use super::{PersistenceError, Result};
use crate::types::{
    AttributionRecord, CommunityId, InviteStats, InviterCount, InviterSummary, UserId,
};

/// Number of inviters reported by [`MembershipStore::stats`].
pub const TOP_INVITERS_LIMIT: usize = 5;

const ATTRIBUTIONS_FILE: &str = "attributions.log";
const FAKE_INVITES_FILE: &str = "fake_invites.json";

/// Rejects identifiers that could escape the state directory.
pub fn validate_path_component(component: &str) -> Result<()> {
    let valid = !component.is_empty()
        && component != "."
        && component != ".."
        && component
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(PersistenceError::InvalidPathComponent(component.to_string()))
    }
}

/// Open files and indexes for one community.
struct CommunityLedger {
    log: AttributionLog,
    latest: HashMap<UserId, AttributionRecord>,
    inviter_totals: HashMap<String, u64>,
    fakes: FakeInviteTable,
}

impl CommunityLedger {
    fn open(dir: &Path, community: &CommunityId) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let (log, records) = AttributionLog::open(dir.join(ATTRIBUTIONS_FILE))?;
        let fakes = FakeInviteTable::load(dir.join(FAKE_INVITES_FILE), community.clone())?;

        let mut ledger = CommunityLedger {
            log,
            latest: HashMap::new(),
            inviter_totals: HashMap::new(),
            fakes,
        };
        for record in records {
            ledger.index(record);
        }

        debug!(
            community = %community,
            rows = ledger.log.rows(),
            members = ledger.latest.len(),
            "Opened attribution ledger"
        );
        Ok(ledger)
    }

    /// Folds one row into the indexes. A row replaces the member's current
    /// one when it is at least as recent; equal timestamps resolve to the row
    /// appended last.
    fn index(&mut self, record: AttributionRecord) {
        if let Some(name) = &record.inviter_display_name {
            *self.inviter_totals.entry(name.clone()).or_insert(0) += 1;
        }

        match self.latest.get(&record.member_id) {
            Some(current) if current.joined_at > record.joined_at => {}
            _ => {
                self.latest.insert(record.member_id.clone(), record);
            }
        }
    }
}

/// A community's ledger, opened on first use.
type LedgerSlot = Arc<Mutex<Option<CommunityLedger>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The attribution / fake-invite ledger for every community.
pub struct MembershipStore {
    state_dir: PathBuf,
    ledgers: Mutex<HashMap<CommunityId, LedgerSlot>>,
}

impl MembershipStore {
    /// Creates a store rooted at `state_dir`, creating the directory.
    pub fn open(state_dir: impl Into<PathBuf>) -> Result<Self> {
        let state_dir = state_dir.into();
        std::fs::create_dir_all(&state_dir)?;
        info!(state_dir = %state_dir.display(), "Opened membership store");

        Ok(MembershipStore {
            state_dir,
            ledgers: Mutex::new(HashMap::new()),
        })
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    fn slot(&self, community: &CommunityId) -> LedgerSlot {
        Arc::clone(lock(&self.ledgers).entry(community.clone()).or_default())
    }

    /// Runs `f` against the community's ledger, opening it if needed.
    ///
    /// A failed open leaves the slot empty so the next call retries.
    fn with_ledger<T>(
        &self,
        community: &CommunityId,
        f: impl FnOnce(&mut CommunityLedger) -> Result<T>,
    ) -> Result<T> {
        validate_path_component(community.as_str())?;

        let slot = self.slot(community);
        let mut ledger = lock(&slot);
        if ledger.is_none() {
            let dir = self.state_dir.join(community.as_str());
            *ledger = Some(CommunityLedger::open(&dir, community)?);
        }

        match ledger.as_mut() {
            Some(ledger) => f(ledger),
            None => Err(PersistenceError::LedgerUnavailable(community.clone())),
        }
    }

    // ─── Writes ───

    /// Appends an attribution row. Storage errors are logged, not returned.
    pub fn record_join(&self, record: AttributionRecord) {
        let community = record.community_id.clone();
        let member = record.member_id.clone();
        if let Err(e) = self.try_record_join(record) {
            error!(
                community = %community,
                member = %member,
                error = %e,
                "Failed to persist attribution"
            );
        }
    }

    /// Appends an attribution row, returning storage errors.
    ///
    /// The in-memory indexes only see the row once it is durable.
    pub fn try_record_join(&self, record: AttributionRecord) -> Result<()> {
        let community = record.community_id.clone();
        self.with_ledger(&community, |ledger| {
            ledger.log.append(&record)?;
            ledger.index(record);
            Ok(())
        })
    }

    /// Adds one to the inviter's fake-invite counter. Storage errors are
    /// logged, not returned.
    pub fn increment_fake_invite_count(&self, community: &CommunityId, inviter_display_name: &str) {
        match self.try_increment_fake_invite_count(community, inviter_display_name) {
            Ok(count) => debug!(
                community = %community,
                inviter = inviter_display_name,
                count,
                "Incremented fake invite counter"
            ),
            Err(e) => error!(
                community = %community,
                inviter = inviter_display_name,
                error = %e,
                "Failed to increment fake invite counter"
            ),
        }
    }

    /// Adds one to the inviter's fake-invite counter and returns the new count.
    pub fn try_increment_fake_invite_count(
        &self,
        community: &CommunityId,
        inviter_display_name: &str,
    ) -> Result<u64> {
        self.with_ledger(community, |ledger| {
            ledger.fakes.increment(inviter_display_name, Utc::now())
        })
    }

    // ─── Reads ───

    /// Returns the member's current attribution: the row with the latest
    /// `joined_at`. Storage errors read as absent.
    pub fn latest_attribution(
        &self,
        community: &CommunityId,
        member: &UserId,
    ) -> Option<AttributionRecord> {
        self.with_ledger(community, |ledger| Ok(ledger.latest.get(member).cloned()))
            .unwrap_or_else(|e| {
                error!(community = %community, member = %member, error = %e, "Failed to read attribution");
                None
            })
    }

    /// Aggregate statistics for reporting.
    pub fn stats(&self, community: &CommunityId) -> Result<InviteStats> {
        self.with_ledger(community, |ledger| {
            let mut top: Vec<InviterCount> = ledger
                .inviter_totals
                .iter()
                .map(|(name, invites)| InviterCount {
                    inviter_display_name: name.clone(),
                    invites: *invites,
                })
                .collect();
            top.sort_by(|a, b| {
                b.invites
                    .cmp(&a.invites)
                    .then_with(|| a.inviter_display_name.cmp(&b.inviter_display_name))
            });
            top.truncate(TOP_INVITERS_LIMIT);

            Ok(InviteStats {
                total_invites: ledger.inviter_totals.values().sum(),
                top_inviters: top,
                fake_invite_total: ledger.fakes.total(),
            })
        })
    }

    /// Totals for one inviter. Storage errors read as zero.
    pub fn inviter_summary(
        &self,
        community: &CommunityId,
        inviter_display_name: &str,
    ) -> InviterSummary {
        self.with_ledger(community, |ledger| {
            Ok(InviterSummary {
                total_invites: ledger
                    .inviter_totals
                    .get(inviter_display_name)
                    .copied()
                    .unwrap_or(0),
                fake_invites: ledger.fakes.get(inviter_display_name),
            })
        })
        .unwrap_or_else(|e| {
            error!(community = %community, error = %e, "Failed to read inviter summary");
            InviterSummary::default()
        })
    }

    /// Drops the cached ledger for a community; files stay on disk.
    ///
    /// An operation already holding the ledger finishes against it.
    pub fn close(&self, community: &CommunityId) {
        lock(&self.ledgers).remove(community);
    }

    /// Whether the community has a ledger directory on disk.
    pub fn has_ledger(&self, community: &CommunityId) -> bool {
        validate_path_component(community.as_str()).is_ok()
            && self.state_dir.join(community.as_str()).is_dir()
    }
}

impl std::fmt::Debug for MembershipStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipStore")
            .field("state_dir", &self.state_dir)
            .finish_non_exhaustive()
    }
}
