//! Routes platform events through attribution, persistence and notification.
//!
//! # Join
//!
//! ```text
//! dedup ─► previous = cached snapshot ─► current = fresh fetch ─► resolve
//!       ─► append ledger row ─► remember join time ─► notify
//! ```
//!
//! # Leave
//!
//! ```text
//! dedup ─► latest ledger row ─► classify (index / payload / row) ─► bump fake
//!       counter if fake ─► forget join time ─► notify
//! ```
//!
//! Ledger reads and writes block on disk and run on the blocking pool.
//!
//! Every event runs in its own task. Nothing serializes joins against each
//! other, so two members joining through the same invitation within one
//! fetch window may both be attributed to whichever invitation the first
//! fetch showed as used.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::config::EngineConfig;
use crate::dedupe::{EventDeduplicator, EventKind};
use crate::events::{InviteEvent, MemberEvent, PlatformEvent};
use crate::invites::{CacheState, SnapshotCache, resolve};
use crate::lifecycle::{Classification, FakeJoinDetector, JoinTimeSources, JoinTimestampIndex};
use crate::notify::{JoinDetails, LeaveDetails, LifecycleNotifier, Notification};
use crate::persistence::MembershipStore;
use crate::platform::{ChannelResolver, Notifier, PlatformApi};
use crate::settings::SettingsStore;
use crate::types::{Attribution, AttributionRecord, CommunityId};

struct Inner<P, S, R, N> {
    config: EngineConfig,
    platform: Arc<P>,
    cache: SnapshotCache<P>,
    dedupe: EventDeduplicator,
    join_index: JoinTimestampIndex,
    detector: FakeJoinDetector,
    store: Arc<MembershipStore>,
    notifier: LifecycleNotifier<S, R, N>,
}

/// The invite-tracking engine.
///
/// Cheap to clone; clones share all state. Each instance owns its own
/// snapshot cache, dedup keys and join index, so several engines can coexist
/// in one process.
pub struct Orchestrator<P, S, R, N> {
    inner: Arc<Inner<P, S, R, N>>,
}

impl<P, S, R, N> Clone for Orchestrator<P, S, R, N> {
    fn clone(&self) -> Self {
        Orchestrator {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, S, R, N> Orchestrator<P, S, R, N>
where
    P: PlatformApi + 'static,
    S: SettingsStore + 'static,
    R: ChannelResolver + 'static,
    N: Notifier + 'static,
{
    pub fn new(
        config: EngineConfig,
        platform: Arc<P>,
        store: Arc<MembershipStore>,
        notifier: LifecycleNotifier<S, R, N>,
    ) -> Self {
        info!(
            refresh_interval_secs = config.refresh_interval.as_secs(),
            dedup_ttl_secs = config.dedup_ttl.num_seconds(),
            fake_threshold_mins = config.fake_threshold.num_minutes(),
            "Creating orchestrator"
        );

        Orchestrator {
            inner: Arc::new(Inner {
                cache: SnapshotCache::new(Arc::clone(&platform)),
                dedupe: EventDeduplicator::new(config.dedup_ttl),
                join_index: JoinTimestampIndex::new(),
                detector: FakeJoinDetector::new(config.fake_threshold),
                config,
                platform,
                store,
                notifier,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<MembershipStore> {
        &self.inner.store
    }

    pub fn cache(&self) -> &SnapshotCache<P> {
        &self.inner.cache
    }

    pub fn join_index(&self) -> &JoinTimestampIndex {
        &self.inner.join_index
    }

    pub fn dedupe(&self) -> &EventDeduplicator {
        &self.inner.dedupe
    }

    pub async fn community_state(&self, community: &CommunityId) -> CacheState {
        self.inner.cache.state(community).await
    }

    /// Handles an event on its own task.
    pub fn dispatch(&self, event: PlatformEvent) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.handle(event).await })
    }

    /// Handles an event inline. Failures are logged, never returned.
    pub async fn handle(&self, event: PlatformEvent) {
        match event {
            PlatformEvent::Ready => self.handle_ready().await,
            PlatformEvent::CommunityJoined(community) => {
                self.refresh_logged(&community, "community joined").await;
            }
            PlatformEvent::CommunityLeft(community) => self.handle_community_left(&community).await,
            PlatformEvent::MemberJoined(event) => {
                self.handle_member_joined(&event).await;
            }
            PlatformEvent::MemberLeft(event) => {
                self.handle_member_left(&event).await;
            }
            PlatformEvent::InviteCreated(InviteEvent { community, code }) => {
                debug!(community = %community, code = %code, "Invitation created");
                self.refresh_logged(&community, "invite created").await;
            }
            PlatformEvent::InviteDeleted(InviteEvent { community, code }) => {
                debug!(community = %community, code = %code, "Invitation deleted");
                self.refresh_logged(&community, "invite deleted").await;
            }
        }
    }

    async fn refresh_logged(&self, community: &CommunityId, reason: &'static str) -> bool {
        match self.inner.cache.refresh(community).await {
            Ok(_) => true,
            Err(e) => {
                warn!(community = %community, reason, error = %e, "Failed to refresh invitation snapshot");
                false
            }
        }
    }

    #[instrument(skip(self))]
    async fn handle_ready(&self) {
        let communities = match self.inner.platform.list_communities().await {
            Ok(communities) => communities,
            Err(e) => {
                warn!(error = %e, "Failed to list communities");
                return;
            }
        };

        let mut refreshed = 0usize;
        for community in &communities {
            if self.refresh_logged(community, "ready").await {
                refreshed += 1;
            }
        }
        info!(communities = communities.len(), refreshed, "Initial snapshots taken");
    }

    /// Runs a ledger operation on the blocking pool. `None` if the task
    /// panicked or was cancelled.
    async fn with_store<T, F>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&MembershipStore) -> T + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.inner.store);
        match tokio::task::spawn_blocking(move || f(store.as_ref())).await {
            Ok(value) => Some(value),
            Err(e) => {
                error!(error = %e, "Ledger task failed");
                None
            }
        }
    }

    #[instrument(skip(self))]
    async fn handle_community_left(&self, community: &CommunityId) {
        self.inner.cache.evict(community).await;
        self.inner.dedupe.forget_community(community);
        self.inner.join_index.forget_community(community);
        self.inner.store.close(community);
        info!(community = %community, "Left community; dropped in-memory state");
    }

    /// Processes a join now. Returns `None` if it was a duplicate.
    pub async fn handle_member_joined(&self, event: &MemberEvent) -> Option<Attribution> {
        self.handle_member_joined_at(event, Utc::now()).await
    }

    /// [`handle_member_joined`](Self::handle_member_joined) with an explicit clock.
    #[instrument(skip(self, event), fields(community = %event.community, member = %event.member.id))]
    pub async fn handle_member_joined_at(
        &self,
        event: &MemberEvent,
        now: DateTime<Utc>,
    ) -> Option<Attribution> {
        let inner = &self.inner;
        let community = &event.community;
        let member = &event.member;

        if !inner
            .dedupe
            .should_process_at(EventKind::MemberJoin, community, &member.id, now)
        {
            return None;
        }

        let previous = inner.cache.get(community).await;
        let current = match inner.cache.refresh(community).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "Failed to fetch invitations after join; resolving without them");
                None
            }
        };

        let attribution = resolve(previous.as_ref(), current.as_ref());
        info!(
            code = attribution.code().map(|c| c.as_str()),
            inviter = attribution.inviter_display_name(),
            method = ?attribution.method(),
            "Attributed join"
        );

        let record =
            AttributionRecord::from_attribution(community.clone(), member.id.clone(), &attribution, now);
        self.with_store(move |store| store.record_join(record)).await;
        inner.join_index.record(community, &member.id, now);

        let inviter_summary = match attribution.inviter_display_name() {
            Some(name) => {
                let (community, name) = (community.clone(), name.to_string());
                Some(
                    self.with_store(move |store| store.inviter_summary(&community, &name))
                        .await
                        .unwrap_or_default(),
                )
            }
            None => None,
        };
        let notification = Notification::member_joined(&JoinDetails {
            member,
            attribution: &attribution,
            inviter_summary,
            member_count: event.member_count,
            at: now,
        });
        inner.notifier.notify(community, &notification).await;

        Some(attribution)
    }

    /// Processes a leave now. Returns `None` if it was a duplicate.
    pub async fn handle_member_left(&self, event: &MemberEvent) -> Option<Classification> {
        self.handle_member_left_at(event, Utc::now()).await
    }

    /// [`handle_member_left`](Self::handle_member_left) with an explicit clock.
    #[instrument(skip(self, event), fields(community = %event.community, member = %event.member.id))]
    pub async fn handle_member_left_at(
        &self,
        event: &MemberEvent,
        now: DateTime<Utc>,
    ) -> Option<Classification> {
        let inner = &self.inner;
        let community = &event.community;
        let member = &event.member;

        if !inner
            .dedupe
            .should_process_at(EventKind::MemberLeave, community, &member.id, now)
        {
            return None;
        }

        let record = {
            let (community, member) = (community.clone(), member.id.clone());
            self.with_store(move |store| store.latest_attribution(&community, &member))
                .await
                .flatten()
        };
        let sources = JoinTimeSources {
            index: inner.join_index.get(community, &member.id),
            platform: member.joined_at,
            record: record.as_ref().map(|record| record.joined_at),
        };
        let classification = inner.detector.classify_leave(sources, now);

        // A row written before the join this leave ends belongs to an
        // earlier membership and says nothing about who invited this one.
        let record = record.filter(|record| {
            classification
                .joined_at
                .is_some_and(|joined_at| record.joined_at >= joined_at)
        });

        if classification.is_fake {
            match record.as_ref().and_then(|r| r.inviter_display_name.clone()) {
                Some(inviter) => {
                    info!(inviter = %inviter, "Leave classified as fake join");
                    let community = community.clone();
                    self.with_store(move |store| {
                        store.increment_fake_invite_count(&community, &inviter)
                    })
                    .await;
                }
                None => info!("Leave classified as fake join; inviter unknown"),
            }
        }

        inner.join_index.take(community, &member.id);

        let notification = Notification::member_left(&LeaveDetails {
            member,
            record: record.as_ref(),
            classification,
            at: now,
        });
        inner.notifier.notify(community, &notification).await;

        Some(classification)
    }

    /// Re-snapshots every community the platform lists, falling back to the
    /// cached ones if the listing fails. Returns how many succeeded.
    ///
    /// Communities whose first snapshot failed are picked up here.
    pub async fn refresh_all(&self) -> usize {
        let communities = match self.inner.platform.list_communities().await {
            Ok(communities) => communities,
            Err(e) => {
                warn!(error = %e, "Failed to list communities; refreshing cached ones");
                self.inner.cache.communities().await
            }
        };
        let mut refreshed = 0;
        for community in &communities {
            if self.refresh_logged(community, "periodic").await {
                refreshed += 1;
            }
        }
        debug!(communities = communities.len(), refreshed, "Periodic refresh complete");
        refreshed
    }

    /// Runs periodic maintenance until `shutdown` fires.
    ///
    /// Each tick re-snapshots every community and sweeps expired
    /// dedup keys. The first tick fires one interval after start; initial
    /// snapshots come from the ready event.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.inner.config.refresh_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Orchestrator shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.refresh_all().await;
                    let swept = self.inner.dedupe.sweep(Utc::now());
                    if swept > 0 {
                        debug!(swept, "Swept expired dedup keys");
                    }
                }
            }
        }
    }
}

impl<P, S, R, N> std::fmt::Debug for Orchestrator<P, S, R, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
