//! Core domain types for the invite tracker.
//!
//! Identifiers, invitation snapshots and the attribution records built from
//! them. Everything here is plain data; behavior lives in the engine modules.

pub mod attribution;
pub mod ids;
pub mod invite;
pub mod member;

pub use attribution::{
    Attribution, AttributionMethod, AttributionRecord, FakeInviteCounter, InviteStats,
    InviterCount, InviterSummary, UNKNOWN_INVITER_LABEL, VANITY_INVITER_LABEL,
};
pub use ids::{ChannelId, CommunityId, InviteCode, UserId};
pub use invite::{InvitationSnapshot, InviteInfo, Inviter, VanityInvite};
pub use member::Member;
