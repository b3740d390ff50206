//! Orchestrator tests against in-memory collaborators.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tempfile::{TempDir, tempdir};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::events::{MemberEvent, PlatformEvent};
use crate::invites::CacheState;
use crate::lifecycle::Classification;
use crate::notify::{FAKE_LEAVE_COLOR, LEAVE_COLOR, LifecycleNotifier};
use crate::persistence::MembershipStore;
use crate::settings::{CommunitySettings, MemorySettingsStore, SettingsStore};
use crate::test_utils::{FakeChannels, FakePlatform, RecordingNotifier, invite};
use crate::types::{
    Attribution, AttributionMethod, ChannelId, CommunityId, InviteCode, Member, UserId,
};

const COMMUNITY: &str = "100";

type TestEngine = Orchestrator<FakePlatform, MemorySettingsStore, FakeChannels, RecordingNotifier>;

struct Harness {
    engine: TestEngine,
    platform: Arc<FakePlatform>,
    channels: Arc<FakeChannels>,
    settings: Arc<MemorySettingsStore>,
    sink: Arc<RecordingNotifier>,
}

fn build(state_dir: &Path) -> Harness {
    let platform = Arc::new(FakePlatform::new());
    let channels = Arc::new(FakeChannels::new());
    channels.add(COMMUNITY, "9");

    let settings = Arc::new(MemorySettingsStore::new());
    settings.insert(
        CommunityId::from(COMMUNITY),
        CommunitySettings {
            notify_channel_id: Some(ChannelId::new("9")),
            ..Default::default()
        },
    );

    let sink = Arc::new(RecordingNotifier::new());
    let store = Arc::new(MembershipStore::open(state_dir).unwrap());
    let notifier = LifecycleNotifier::new(
        Arc::clone(&settings),
        Arc::clone(&channels),
        Arc::clone(&sink),
    );
    let engine = Orchestrator::new(EngineConfig::default(), Arc::clone(&platform), store, notifier);

    Harness {
        engine,
        platform,
        channels,
        settings,
        sink,
    }
}

fn harness() -> (Harness, TempDir) {
    let dir = tempdir().unwrap();
    (build(dir.path()), dir)
}

fn t0() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
}

fn minutes(n: i64) -> chrono::Duration {
    chrono::Duration::minutes(n)
}

fn community() -> CommunityId {
    CommunityId::from(COMMUNITY)
}

fn member_event(member: &str) -> MemberEvent {
    MemberEvent {
        community: community(),
        member: Member::new(member, format!("user{member}")),
        member_count: Some(10),
    }
}

/// Snapshots `{A: 4}`, then bumps A to 5 and adds an unused B.
async fn prime_alice(h: &Harness) {
    h.platform.set_invites(COMMUNITY, vec![invite("A", "alice", 4)]);
    h.engine
        .handle(PlatformEvent::CommunityJoined(community()))
        .await;
    h.platform.set_invites(
        COMMUNITY,
        vec![invite("A", "alice", 5), invite("B", "bob", 0)],
    );
}

// ─── Joins ───

#[tokio::test]
async fn join_attributed_to_incremented_invite() {
    let (h, _dir) = harness();
    prime_alice(&h).await;
    assert!(matches!(
        h.engine.community_state(&community()).await,
        CacheState::Cached { .. }
    ));

    let attribution = h
        .engine
        .handle_member_joined_at(&member_event("42"), t0())
        .await
        .unwrap();
    assert_eq!(attribution.code(), Some(&InviteCode::from("A")));

    let record = h
        .engine
        .store()
        .latest_attribution(&community(), &UserId::from("42"))
        .unwrap();
    assert_eq!(record.invitation_code, Some(InviteCode::from("A")));
    assert_eq!(record.inviter_display_name.as_deref(), Some("alice"));
    assert_eq!(record.inviter_id, Some(UserId::from("id-alice")));
    assert_eq!(record.joined_at, t0());
    assert_eq!(
        h.engine.join_index().get(&community(), &UserId::from("42")),
        Some(t0())
    );

    let sent = h.sink.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.id, ChannelId::new("9"));
    assert_eq!(sent[0].1.title, "Member Joined");
    assert_eq!(sent[0].1.field("Invited By"), Some("alice (1 invite)"));
    assert_eq!(sent[0].1.field("Server Stats"), Some("Member #10"));
}

#[tokio::test]
async fn join_with_no_invitations_is_unknown() {
    let (h, _dir) = harness();

    let attribution = h
        .engine
        .handle_member_joined_at(&member_event("42"), t0())
        .await
        .unwrap();
    assert_eq!(attribution, Attribution::Unknown);

    let record = h
        .engine
        .store()
        .latest_attribution(&community(), &UserId::from("42"))
        .unwrap();
    assert_eq!(record.invitation_code, None);
    assert_eq!(record.inviter_display_name, None);
    assert_eq!(h.sink.sent()[0].1.field("Invited By"), Some("Unknown"));
}

#[tokio::test]
async fn duplicate_join_within_ttl_processed_once() {
    let (h, _dir) = harness();
    prime_alice(&h).await;
    let fetches = h.platform.invite_fetches();

    let event = member_event("42");
    assert!(h.engine.handle_member_joined_at(&event, t0()).await.is_some());
    assert!(
        h.engine
            .handle_member_joined_at(&event, t0() + chrono::Duration::seconds(2))
            .await
            .is_none()
    );

    assert_eq!(h.platform.invite_fetches(), fetches + 1);
    assert_eq!(h.sink.sent().len(), 1);
    assert_eq!(h.engine.store().stats(&community()).unwrap().total_invites, 1);
}

#[tokio::test]
async fn failed_fetch_after_join_resolves_without_current() {
    let (h, _dir) = harness();
    h.platform.set_invites(COMMUNITY, vec![invite("A", "alice", 4)]);
    h.engine
        .handle(PlatformEvent::CommunityJoined(community()))
        .await;
    h.platform.fail_invites(COMMUNITY);

    let attribution = h
        .engine
        .handle_member_joined_at(&member_event("42"), t0())
        .await
        .unwrap();

    assert_eq!(attribution, Attribution::Unknown);
    let cached = h.engine.cache().get(&community()).await.unwrap();
    assert_eq!(cached.get(&InviteCode::from("A")).unwrap().use_count, 4);
}

#[tokio::test]
async fn stale_notification_channel_is_cleared() {
    let (h, _dir) = harness();
    h.channels.remove(COMMUNITY, "9");

    h.engine
        .handle_member_joined_at(&member_event("42"), t0())
        .await
        .unwrap();

    assert!(h.sink.sent().is_empty());
    let settings = h.settings.get_settings(&community()).await.unwrap();
    assert!(settings.notify_channel_id.is_none());
}

// ─── Leaves ───

#[tokio::test]
async fn leave_after_ten_minutes_is_fake() {
    let (h, _dir) = harness();
    prime_alice(&h).await;
    let event = member_event("42");
    h.engine.handle_member_joined_at(&event, t0()).await.unwrap();

    let classification = h
        .engine
        .handle_member_left_at(&event, t0() + minutes(10))
        .await
        .unwrap();

    assert!(classification.is_fake);
    assert_eq!(classification.time_in_server, Some(minutes(10)));
    assert_eq!(
        h.engine
            .store()
            .inviter_summary(&community(), "alice")
            .fake_invites,
        1
    );
    assert!(h.engine.join_index().is_empty());

    let sent = h.sink.sent();
    let leave = &sent.last().unwrap().1;
    assert_eq!(leave.title, "Member Left");
    assert_eq!(leave.color, FAKE_LEAVE_COLOR);
    assert_eq!(leave.field("Time in Server"), Some("10m"));
    assert_eq!(leave.field("Invited By"), Some("alice"));
}

#[tokio::test]
async fn leave_after_forty_five_minutes_is_genuine() {
    let (h, _dir) = harness();
    prime_alice(&h).await;
    let event = member_event("42");
    h.engine.handle_member_joined_at(&event, t0()).await.unwrap();

    let classification = h
        .engine
        .handle_member_left_at(&event, t0() + minutes(45))
        .await
        .unwrap();

    assert!(!classification.is_fake);
    assert_eq!(
        h.engine
            .store()
            .inviter_summary(&community(), "alice")
            .fake_invites,
        0
    );
    assert_eq!(h.sink.sent().last().unwrap().1.color, LEAVE_COLOR);
}

#[tokio::test]
async fn leave_after_restart_uses_ledger_join_time() {
    let dir = tempdir().unwrap();
    {
        let h = build(dir.path());
        prime_alice(&h).await;
        h.engine
            .handle_member_joined_at(&member_event("42"), t0())
            .await
            .unwrap();
    }

    let h = build(dir.path());
    let classification = h
        .engine
        .handle_member_left_at(&member_event("42"), t0() + minutes(10))
        .await
        .unwrap();

    assert!(classification.is_fake);
    assert_eq!(classification.joined_at, Some(t0()));
    assert_eq!(
        h.engine.store().stats(&community()).unwrap().fake_invite_total,
        1
    );
}

#[tokio::test]
async fn leave_uses_platform_join_time_without_counter() {
    let (h, _dir) = harness();
    let mut event = member_event("42");
    event.member.joined_at = Some(t0() - minutes(5));

    let classification = h.engine.handle_member_left_at(&event, t0()).await.unwrap();

    assert!(classification.is_fake);
    assert_eq!(
        h.engine.store().stats(&community()).unwrap().fake_invite_total,
        0
    );
}

#[tokio::test]
async fn fake_rejoin_does_not_charge_earlier_inviter() {
    let dir = tempdir().unwrap();
    {
        let h = build(dir.path());
        prime_alice(&h).await;
        h.engine
            .handle_member_joined_at(&member_event("42"), t0())
            .await
            .unwrap();
    }

    // The member left and came back while the engine was down; the platform
    // reports the newer join, which the ledger never saw.
    let h = build(dir.path());
    let left_at = t0() + chrono::Duration::days(2);
    let mut event = member_event("42");
    event.member.joined_at = Some(left_at - minutes(5));

    let classification = h.engine.handle_member_left_at(&event, left_at).await.unwrap();

    assert!(classification.is_fake);
    assert_eq!(classification.joined_at, Some(left_at - minutes(5)));
    assert_eq!(
        h.engine.store().inviter_summary(&community(), "alice").fake_invites,
        0
    );
    assert_eq!(
        h.sink.sent().last().unwrap().1.field("Invited By"),
        Some("Unknown")
    );
}

#[tokio::test]
async fn leave_with_no_join_time_is_indeterminate() {
    let (h, _dir) = harness();
    let classification = h
        .engine
        .handle_member_left_at(&member_event("42"), t0())
        .await
        .unwrap();

    assert_eq!(classification, Classification::indeterminate());
    assert_eq!(
        h.sink.sent().last().unwrap().1.field("Time in Server"),
        Some("Unknown")
    );
}

#[tokio::test]
async fn duplicate_leave_is_dropped() {
    let (h, _dir) = harness();
    let event = member_event("42");
    assert!(h.engine.handle_member_left_at(&event, t0()).await.is_some());
    assert!(
        h.engine
            .handle_member_left_at(&event, t0() + chrono::Duration::seconds(1))
            .await
            .is_none()
    );
}

// ─── Community lifecycle ───

#[tokio::test]
async fn ready_snapshots_every_community() {
    let (h, _dir) = harness();
    h.platform.set_invites("1", vec![invite("A", "alice", 1)]);
    h.platform.set_invites("2", Vec::new());

    h.engine.handle(PlatformEvent::Ready).await;

    assert_eq!(
        h.engine.cache().communities().await,
        vec![CommunityId::from("1"), CommunityId::from("2")]
    );
}

#[tokio::test]
async fn community_left_drops_in_memory_state() {
    let (h, _dir) = harness();
    prime_alice(&h).await;
    h.engine
        .handle_member_joined_at(&member_event("42"), t0())
        .await
        .unwrap();

    h.engine
        .handle(PlatformEvent::CommunityLeft(community()))
        .await;

    assert_eq!(
        h.engine.community_state(&community()).await,
        CacheState::Uninitialized
    );
    assert!(h.engine.join_index().is_empty());
    assert!(h.engine.dedupe().is_empty());
    // The ledger itself survives.
    assert!(
        h.engine
            .store()
            .latest_attribution(&community(), &UserId::from("42"))
            .is_some()
    );
}

#[tokio::test]
async fn invite_events_refresh_snapshot() {
    let (h, _dir) = harness();
    h.platform.set_invites(COMMUNITY, vec![invite("A", "alice", 0)]);

    h.engine
        .handle(PlatformEvent::InviteCreated(crate::events::InviteEvent {
            community: community(),
            code: InviteCode::from("A"),
        }))
        .await;
    assert_eq!(h.engine.cache().get(&community()).await.unwrap().len(), 1);

    h.platform.set_invites(COMMUNITY, Vec::new());
    h.engine
        .handle(PlatformEvent::InviteDeleted(crate::events::InviteEvent {
            community: community(),
            code: InviteCode::from("A"),
        }))
        .await;
    assert!(h.engine.cache().get(&community()).await.unwrap().is_empty());
}

#[tokio::test]
async fn dispatch_runs_on_its_own_task() {
    let (h, _dir) = harness();
    h.platform.set_invites(COMMUNITY, Vec::new());

    h.engine
        .dispatch(PlatformEvent::CommunityJoined(community()))
        .await
        .unwrap();

    assert!(matches!(
        h.engine.community_state(&community()).await,
        CacheState::Cached { .. }
    ));
}

#[tokio::test]
async fn engines_do_not_share_state() {
    let (a, _dir_a) = harness();
    let (b, _dir_b) = harness();
    prime_alice(&a).await;

    assert_eq!(
        b.engine.community_state(&community()).await,
        CacheState::Uninitialized
    );
}

// ─── Periodic loop ───

#[tokio::test]
async fn periodic_refresh_recovers_failed_initial_snapshot() {
    let (h, _dir) = harness();
    h.platform.set_invites(COMMUNITY, vec![invite("A", "alice", 4)]);
    h.platform.fail_invites(COMMUNITY);

    h.engine.handle(PlatformEvent::Ready).await;
    assert_eq!(
        h.engine.community_state(&community()).await,
        CacheState::Uninitialized
    );

    h.platform.set_invites(COMMUNITY, vec![invite("A", "alice", 4)]);
    assert_eq!(h.engine.refresh_all().await, 1);
    assert!(matches!(
        h.engine.community_state(&community()).await,
        CacheState::Cached { .. }
    ));

    h.platform.set_invites(COMMUNITY, vec![invite("A", "alice", 5)]);
    let attribution = h
        .engine
        .handle_member_joined_at(&member_event("42"), t0())
        .await
        .unwrap();
    assert_eq!(attribution.code(), Some(&InviteCode::from("A")));
    assert_eq!(attribution.method(), Some(AttributionMethod::UseCountIncrease));
}

#[tokio::test(start_paused = true)]
async fn run_refreshes_until_cancelled() {
    let (h, _dir) = harness();
    h.platform.set_invites(COMMUNITY, vec![invite("A", "alice", 1)]);
    h.engine
        .handle(PlatformEvent::CommunityJoined(community()))
        .await;
    let fetches = h.platform.invite_fetches();

    let shutdown = CancellationToken::new();
    let task = {
        let engine = h.engine.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { engine.run(shutdown).await })
    };

    tokio::time::sleep(Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS + 1)).await;
    assert_eq!(h.platform.invite_fetches(), fetches + 1);

    shutdown.cancel();
    task.await.unwrap();
}
