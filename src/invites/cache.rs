//! Latest invitation snapshot per community.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::platform::{PlatformApi, Result};
use crate::types::{CommunityId, InvitationSnapshot};

/// Whether a community has been snapshotted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Uninitialized,
    Cached { fetched_at: DateTime<Utc> },
}

/// A stored snapshot and the generation of the refresh that produced it.
struct Entry {
    generation: u64,
    snapshot: InvitationSnapshot,
}

/// Holds the most recent successful snapshot of each community.
///
/// A failed refresh leaves the previous snapshot in place. Refreshes may
/// overlap; each takes a generation before querying the platform, and a
/// refresh never replaces a snapshot from a later generation.
pub struct SnapshotCache<P> {
    platform: Arc<P>,
    next_generation: AtomicU64,
    snapshots: RwLock<HashMap<CommunityId, Entry>>,
}

impl<P: PlatformApi> SnapshotCache<P> {
    pub fn new(platform: Arc<P>) -> Self {
        SnapshotCache {
            platform,
            next_generation: AtomicU64::new(0),
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    pub fn platform(&self) -> &Arc<P> {
        &self.platform
    }

    /// Fetches a fresh snapshot, stores it, and returns the newest snapshot
    /// held for the community.
    ///
    /// The vanity link is fetched alongside. If only the vanity lookup
    /// fails, the previously known vanity link is carried over. If a refresh
    /// that started later has already stored its result, that result is
    /// kept and returned instead.
    pub async fn refresh(&self, community: &CommunityId) -> Result<InvitationSnapshot> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let started_at = Utc::now();
        let invites = self.platform.fetch_invites(community).await?;

        let vanity = match self.platform.fetch_vanity(community).await {
            Ok(vanity) => vanity,
            Err(e) => {
                warn!(community = %community, error = %e, "Failed to fetch vanity link; keeping last known");
                self.get(community).await.and_then(|snapshot| snapshot.vanity)
            }
        };

        let snapshot = InvitationSnapshot::new(community.clone(), invites, vanity, started_at);

        let mut snapshots = self.snapshots.write().await;
        if let Some(newer) = snapshots
            .get(community)
            .filter(|entry| entry.generation > generation)
        {
            debug!(
                community = %community,
                generation,
                stored_generation = newer.generation,
                "Discarding snapshot overtaken by a later refresh"
            );
            return Ok(newer.snapshot.clone());
        }

        debug!(
            community = %community,
            generation,
            invites = snapshot.len(),
            vanity = snapshot.vanity.is_some(),
            "Refreshed invitation snapshot"
        );
        snapshots.insert(
            community.clone(),
            Entry {
                generation,
                snapshot: snapshot.clone(),
            },
        );
        Ok(snapshot)
    }

    pub async fn get(&self, community: &CommunityId) -> Option<InvitationSnapshot> {
        self.snapshots
            .read()
            .await
            .get(community)
            .map(|entry| entry.snapshot.clone())
    }

    pub async fn state(&self, community: &CommunityId) -> CacheState {
        match self.snapshots.read().await.get(community) {
            Some(entry) => CacheState::Cached {
                fetched_at: entry.snapshot.fetched_at,
            },
            None => CacheState::Uninitialized,
        }
    }

    pub async fn evict(&self, community: &CommunityId) {
        self.snapshots.write().await.remove(community);
    }

    /// Communities with a cached snapshot, sorted.
    pub async fn communities(&self) -> Vec<CommunityId> {
        let mut communities: Vec<CommunityId> =
            self.snapshots.read().await.keys().cloned().collect();
        communities.sort();
        communities
    }
}

impl<P> std::fmt::Debug for SnapshotCache<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache").finish_non_exhaustive()
    }
}
