//! Attribution results and the rows persisted for them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CommunityId, InviteCode, UserId};

/// Inviter label used when a join is attributed to the vanity link.
pub const VANITY_INVITER_LABEL: &str = "Vanity URL";

/// Inviter label used when an invitation carries no inviter.
pub const UNKNOWN_INVITER_LABEL: &str = "Unknown";

/// Which resolution rule produced an attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionMethod {
    /// An invitation present in both snapshots gained uses.
    UseCountIncrease,
    /// Fell back to the community's vanity link.
    Vanity,
    /// An invitation created since the last snapshot already has uses.
    NewInvite,
    /// No prior snapshot existed; picked the newest used invitation.
    BestGuess,
}

/// The inferred invitation behind a join.
///
/// `Unknown` is a valid terminal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attribution {
    Invite {
        code: InviteCode,
        inviter_id: Option<UserId>,
        inviter_display_name: String,
        method: AttributionMethod,
    },
    Unknown,
}

impl Attribution {
    pub fn is_known(&self) -> bool {
        matches!(self, Attribution::Invite { .. })
    }

    pub fn code(&self) -> Option<&InviteCode> {
        match self {
            Attribution::Invite { code, .. } => Some(code),
            Attribution::Unknown => None,
        }
    }

    pub fn inviter_id(&self) -> Option<&UserId> {
        match self {
            Attribution::Invite { inviter_id, .. } => inviter_id.as_ref(),
            Attribution::Unknown => None,
        }
    }

    pub fn inviter_display_name(&self) -> Option<&str> {
        match self {
            Attribution::Invite {
                inviter_display_name,
                ..
            } => Some(inviter_display_name),
            Attribution::Unknown => None,
        }
    }

    pub fn method(&self) -> Option<AttributionMethod> {
        match self {
            Attribution::Invite { method, .. } => Some(*method),
            Attribution::Unknown => None,
        }
    }
}

/// One observed join, as stored in the attribution ledger.
///
/// Rows are append-only. For a member with several join/leave cycles the row
/// with the latest `joined_at` describes the current membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionRecord {
    pub community_id: CommunityId,
    pub member_id: UserId,
    pub invitation_code: Option<InviteCode>,
    pub inviter_display_name: Option<String>,
    pub inviter_id: Option<UserId>,
    pub joined_at: DateTime<Utc>,
}

impl AttributionRecord {
    /// Builds the ledger row for a resolved join.
    pub fn from_attribution(
        community_id: CommunityId,
        member_id: UserId,
        attribution: &Attribution,
        joined_at: DateTime<Utc>,
    ) -> Self {
        AttributionRecord {
            community_id,
            member_id,
            invitation_code: attribution.code().cloned(),
            inviter_display_name: attribution.inviter_display_name().map(str::to_string),
            inviter_id: attribution.inviter_id().cloned(),
            joined_at,
        }
    }
}

/// Per-inviter count of joins classified as fake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FakeInviteCounter {
    pub community_id: CommunityId,
    pub inviter_display_name: String,
    pub count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An inviter and the number of joins attributed to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviterCount {
    pub inviter_display_name: String,
    pub invites: u64,
}

/// Aggregate invite statistics for one community.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteStats {
    /// Joins attributed to a known invitation.
    pub total_invites: u64,

    /// At most five inviters, highest count first.
    pub top_inviters: Vec<InviterCount>,

    /// Sum of all fake-invite counters.
    pub fake_invite_total: u64,
}

/// Totals for a single inviter, shown alongside join notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviterSummary {
    pub total_invites: u64,
    pub fake_invites: u64,
}
