//! Invitation links and point-in-time snapshots of a community's invite set.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CommunityId, InviteCode, UserId};

/// The account that created an invitation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Inviter {
    pub id: UserId,
    pub display_name: String,
}

impl Inviter {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Inviter {
            id: UserId::new(id),
            display_name: display_name.into(),
        }
    }
}

/// A single invitation as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteInfo {
    pub code: InviteCode,

    /// Widget and integration invites have no inviter.
    pub inviter: Option<Inviter>,

    /// Number of times the invitation has been redeemed.
    pub use_count: u64,

    pub created_at: DateTime<Utc>,
}

/// The community's branded, non-expiring invitation.
///
/// Vanity links have no inviter of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VanityInvite {
    pub code: InviteCode,
    pub use_count: u64,
}

/// A full point-in-time copy of a community's invitations.
///
/// Snapshots are replaced wholesale on refresh and never patched in place.
/// Invitations are keyed by code in a `BTreeMap` so that iteration order,
/// and therefore first-match-wins attribution, is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationSnapshot {
    pub community: CommunityId,

    /// When the platform was queried.
    pub fetched_at: DateTime<Utc>,

    pub invites: BTreeMap<InviteCode, InviteInfo>,

    pub vanity: Option<VanityInvite>,
}

impl InvitationSnapshot {
    /// Builds a snapshot from the platform's invite listing.
    ///
    /// If the platform lists the same code twice, the later entry wins.
    pub fn new(
        community: CommunityId,
        invites: impl IntoIterator<Item = InviteInfo>,
        vanity: Option<VanityInvite>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        InvitationSnapshot {
            community,
            fetched_at,
            invites: invites
                .into_iter()
                .map(|invite| (invite.code.clone(), invite))
                .collect(),
            vanity,
        }
    }

    /// Creates a snapshot with no invitations.
    pub fn empty(community: CommunityId, fetched_at: DateTime<Utc>) -> Self {
        Self::new(community, Vec::new(), None, fetched_at)
    }

    pub fn get(&self, code: &InviteCode) -> Option<&InviteInfo> {
        self.invites.get(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InviteInfo> {
        self.invites.values()
    }

    pub fn len(&self) -> usize {
        self.invites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invites.is_empty()
    }
}
