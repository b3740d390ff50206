//! Typed platform events.

use serde::{Deserialize, Serialize};

use crate::types::{CommunityId, InviteCode, Member};

/// A member joining or leaving a community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEvent {
    #[serde(rename = "community_id")]
    pub community: CommunityId,
    pub member: Member,
    /// Community size after the event, when the platform includes it.
    #[serde(default)]
    pub member_count: Option<u64>,
}

/// An invitation being created or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteEvent {
    #[serde(rename = "community_id")]
    pub community: CommunityId,
    pub code: InviteCode,
}

/// Events the engine reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// The gateway session is up; every community should be snapshotted.
    Ready,
    CommunityJoined(CommunityId),
    CommunityLeft(CommunityId),
    MemberJoined(MemberEvent),
    MemberLeft(MemberEvent),
    InviteCreated(InviteEvent),
    InviteDeleted(InviteEvent),
}

impl PlatformEvent {
    /// The `x-event-type` name this event arrives under.
    pub fn name(&self) -> &'static str {
        match self {
            PlatformEvent::Ready => "ready",
            PlatformEvent::CommunityJoined(_) => "community_joined",
            PlatformEvent::CommunityLeft(_) => "community_left",
            PlatformEvent::MemberJoined(_) => "member_joined",
            PlatformEvent::MemberLeft(_) => "member_left",
            PlatformEvent::InviteCreated(_) => "invite_created",
            PlatformEvent::InviteDeleted(_) => "invite_deleted",
        }
    }

    /// The community the event concerns. `None` for [`PlatformEvent::Ready`].
    pub fn community(&self) -> Option<&CommunityId> {
        match self {
            PlatformEvent::Ready => None,
            PlatformEvent::CommunityJoined(community) | PlatformEvent::CommunityLeft(community) => {
                Some(community)
            }
            PlatformEvent::MemberJoined(event) | PlatformEvent::MemberLeft(event) => {
                Some(&event.community)
            }
            PlatformEvent::InviteCreated(event) | PlatformEvent::InviteDeleted(event) => {
                Some(&event.community)
            }
        }
    }
}
