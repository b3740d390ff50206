//! Shared test utilities: proptest generators and in-memory collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use tokio::sync::oneshot;

use crate::notify::Notification;
use crate::platform::{
    Channel, ChannelResolver, Notifier, PlatformApi, PlatformApiError, Result as PlatformResult,
};
use crate::types::{
    AttributionRecord, ChannelId, CommunityId, InviteCode, InviteInfo, Inviter, UserId,
    VanityInvite,
};

// ─── Generators ───

pub fn arb_snowflake() -> impl Strategy<Value = String> {
    "[1-9][0-9]{0,18}"
}

pub fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (1_500_000_000_000i64..1_900_000_000_000i64)
        .prop_map(|millis| DateTime::<Utc>::from_timestamp_millis(millis).unwrap())
}

pub fn arb_attribution_record() -> impl Strategy<Value = AttributionRecord> {
    (
        arb_snowflake(),
        arb_snowflake(),
        proptest::option::of("[a-zA-Z0-9]{4,10}"),
        proptest::option::of("[a-zA-Z0-9 _]{1,24}"),
        proptest::option::of(arb_snowflake()),
        arb_timestamp(),
    )
        .prop_map(
            |(community, member, code, name, inviter, joined_at)| AttributionRecord {
                community_id: CommunityId::new(community),
                member_id: UserId::new(member),
                invitation_code: code.map(InviteCode::new),
                inviter_display_name: name,
                inviter_id: inviter.map(UserId::new),
                joined_at,
            },
        )
}

// ─── Builders ───

/// An invitation created by `inviter` (id `id-<inviter>`).
pub fn invite(code: &str, inviter: &str, uses: u64) -> InviteInfo {
    InviteInfo {
        code: InviteCode::from(code),
        inviter: Some(Inviter::new(format!("id-{inviter}"), inviter)),
        use_count: uses,
        created_at: DateTime::<Utc>::from_timestamp(1_600_000_000, 0).unwrap(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Platform ───

/// Scriptable in-memory platform.
#[derive(Debug, Default)]
pub struct FakePlatform {
    invites: Mutex<HashMap<CommunityId, Vec<InviteInfo>>>,
    vanity: Mutex<HashMap<CommunityId, VanityInvite>>,
    failing_invites: Mutex<HashSet<CommunityId>>,
    failing_vanity: Mutex<HashSet<CommunityId>>,
    held_invites: Mutex<HashMap<CommunityId, oneshot::Receiver<()>>>,
    invite_fetches: AtomicUsize,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a community's invitations and makes its fetches succeed again.
    pub fn set_invites(&self, community: &str, invites: Vec<InviteInfo>) {
        let community = CommunityId::from(community);
        lock(&self.failing_invites).remove(&community);
        lock(&self.invites).insert(community, invites);
    }

    pub fn set_vanity(&self, community: &str, vanity: Option<VanityInvite>) {
        let community = CommunityId::from(community);
        lock(&self.failing_vanity).remove(&community);
        match vanity {
            Some(vanity) => lock(&self.vanity).insert(community, vanity),
            None => lock(&self.vanity).remove(&community),
        };
    }

    pub fn fail_invites(&self, community: &str) {
        lock(&self.failing_invites).insert(CommunityId::from(community));
    }

    pub fn fail_vanity(&self, community: &str) {
        lock(&self.failing_vanity).insert(CommunityId::from(community));
    }

    /// Makes the next invitation fetch for `community` read the current
    /// invitations, then wait until the returned sender fires (or is dropped)
    /// before answering.
    pub fn hold_invites(&self, community: &str) -> oneshot::Sender<()> {
        let (release, held) = oneshot::channel();
        lock(&self.held_invites).insert(CommunityId::from(community), held);
        release
    }

    pub fn invite_fetches(&self) -> usize {
        self.invite_fetches.load(Ordering::SeqCst)
    }
}

impl PlatformApi for FakePlatform {
    async fn fetch_invites(&self, community: &CommunityId) -> PlatformResult<Vec<InviteInfo>> {
        let result = if lock(&self.failing_invites).contains(community) {
            Err(PlatformApiError::transient_without_source("invites unavailable"))
        } else {
            Ok(lock(&self.invites).get(community).cloned().unwrap_or_default())
        };
        let held = lock(&self.held_invites).remove(community);
        self.invite_fetches.fetch_add(1, Ordering::SeqCst);

        if let Some(held) = held {
            let _ = held.await;
        }
        result
    }

    async fn fetch_vanity(&self, community: &CommunityId) -> PlatformResult<Option<VanityInvite>> {
        if lock(&self.failing_vanity).contains(community) {
            return Err(PlatformApiError::transient_without_source("vanity unavailable"));
        }
        Ok(lock(&self.vanity).get(community).cloned())
    }

    async fn list_communities(&self) -> PlatformResult<Vec<CommunityId>> {
        let mut communities: Vec<CommunityId> = lock(&self.invites).keys().cloned().collect();
        communities.sort();
        Ok(communities)
    }
}

// ─── Channels ───

/// Channels that exist, keyed by community.
#[derive(Debug, Default)]
pub struct FakeChannels {
    channels: Mutex<HashSet<(CommunityId, ChannelId)>>,
}

impl FakeChannels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, community: &str, channel: &str) {
        lock(&self.channels).insert((CommunityId::from(community), ChannelId::new(channel)));
    }

    pub fn remove(&self, community: &str, channel: &str) {
        lock(&self.channels).remove(&(CommunityId::from(community), ChannelId::new(channel)));
    }
}

impl ChannelResolver for FakeChannels {
    async fn resolve_channel(
        &self,
        community: &CommunityId,
        channel: &ChannelId,
    ) -> PlatformResult<Option<Channel>> {
        let exists = lock(&self.channels).contains(&(community.clone(), channel.clone()));
        Ok(exists.then(|| Channel {
            id: channel.clone(),
            community: community.clone(),
            name: None,
        }))
    }
}

// ─── Notifier ───

/// Records every notification it is asked to send.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Channel, Notification)>>,
    fail_next: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(Channel, Notification)> {
        lock(&self.sent).clone()
    }

    /// Makes the next send fail with a transient error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, channel: &Channel, notification: &Notification) -> PlatformResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PlatformApiError::transient_without_source("send failed"));
        }
        lock(&self.sent).push((channel.clone(), notification.clone()));
        Ok(())
    }
}
