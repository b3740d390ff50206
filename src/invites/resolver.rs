//! Infers which invitation a new member used.
//!
//! The platform does not say which invitation a member redeemed. The
//! resolver compares the snapshot taken before the join with one taken just
//! after it and applies these rules in order, first hit wins:
//!
//! 1. an invitation present in both whose use count went up
//! 2. the community's vanity link
//! 3. an invitation that is new since the previous snapshot and already used
//! 4. with no previous snapshot at all, the newest used invitation
//! 5. otherwise [`Attribution::Unknown`]
//!
//! Invitations are visited in code order, so concurrent joins that observe
//! the same snapshots resolve identically.

use crate::types::{
    Attribution, AttributionMethod, InvitationSnapshot, InviteInfo, UNKNOWN_INVITER_LABEL,
    VANITY_INVITER_LABEL,
};

fn attribute(invite: &InviteInfo, method: AttributionMethod) -> Attribution {
    let (inviter_id, inviter_display_name) = match &invite.inviter {
        Some(inviter) => (Some(inviter.id.clone()), inviter.display_name.clone()),
        None => (None, UNKNOWN_INVITER_LABEL.to_string()),
    };
    Attribution::Invite {
        code: invite.code.clone(),
        inviter_id,
        inviter_display_name,
        method,
    }
}

/// Resolves a join from the snapshots around it.
///
/// `current` is `None` when the post-join fetch failed; `previous` is `None`
/// when the community had never been snapshotted.
pub fn resolve(
    previous: Option<&InvitationSnapshot>,
    current: Option<&InvitationSnapshot>,
) -> Attribution {
    if let (Some(previous), Some(current)) = (previous, current) {
        let increased = current.iter().find(|invite| {
            previous
                .get(&invite.code)
                .is_some_and(|before| invite.use_count > before.use_count)
        });
        if let Some(invite) = increased {
            return attribute(invite, AttributionMethod::UseCountIncrease);
        }
    }

    let vanity = current
        .and_then(|snapshot| snapshot.vanity.as_ref())
        .or_else(|| previous.and_then(|snapshot| snapshot.vanity.as_ref()));
    if let Some(vanity) = vanity {
        return Attribution::Invite {
            code: vanity.code.clone(),
            inviter_id: None,
            inviter_display_name: VANITY_INVITER_LABEL.to_string(),
            method: AttributionMethod::Vanity,
        };
    }

    match (previous, current) {
        (Some(previous), Some(current)) => {
            let created = current
                .iter()
                .find(|invite| invite.use_count > 0 && previous.get(&invite.code).is_none());
            if let Some(invite) = created {
                return attribute(invite, AttributionMethod::NewInvite);
            }
        }
        (None, Some(current)) => {
            let mut newest: Option<&InviteInfo> = None;
            for invite in current.iter().filter(|invite| invite.use_count > 0) {
                if newest.is_none_or(|best| invite.created_at > best.created_at) {
                    newest = Some(invite);
                }
            }
            if let Some(invite) = newest {
                return attribute(invite, AttributionMethod::BestGuess);
            }
        }
        _ => {}
    }

    Attribution::Unknown
}
