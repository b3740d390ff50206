//! Parses pushed event bodies into [`PlatformEvent`]s.
//!
//! The event type comes from the `x-event-type` header. Unknown types parse
//! to `Ok(None)` so that new gateway events are ignored rather than rejected.
//! Unknown fields inside known payloads are ignored as well.

use serde::Deserialize;
use thiserror::Error;

use super::events::{InviteEvent, MemberEvent, PlatformEvent};
use crate::types::CommunityId;

/// Error type for event parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Malformed JSON or a missing required field.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid field value for {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

#[derive(Debug, Deserialize)]
struct CommunityPayload {
    community_id: CommunityId,
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ParseError> {
    if value.trim().is_empty() {
        return Err(ParseError::InvalidField {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn parse_community(payload: &[u8]) -> Result<CommunityId, ParseError> {
    let raw: CommunityPayload = serde_json::from_slice(payload)?;
    non_empty("community_id", raw.community_id.as_str())?;
    Ok(raw.community_id)
}

fn parse_member(payload: &[u8]) -> Result<MemberEvent, ParseError> {
    let event: MemberEvent = serde_json::from_slice(payload)?;
    non_empty("community_id", event.community.as_str())?;
    non_empty("member.id", event.member.id.as_str())?;
    Ok(event)
}

fn parse_invite(payload: &[u8]) -> Result<InviteEvent, ParseError> {
    let event: InviteEvent = serde_json::from_slice(payload)?;
    non_empty("community_id", event.community.as_str())?;
    non_empty("code", event.code.as_str())?;
    Ok(event)
}

/// Parses an event body.
///
/// * `Ok(Some(event))`: a known event type
/// * `Ok(None)`: unknown event type, to be ignored
/// * `Err(e)`: malformed body for a known type
pub fn parse_event(event_type: &str, payload: &[u8]) -> Result<Option<PlatformEvent>, ParseError> {
    let event = match event_type {
        "ready" => {
            // Body content is irrelevant but must still be JSON.
            serde_json::from_slice::<serde_json::Value>(payload)?;
            PlatformEvent::Ready
        }
        "community_joined" => PlatformEvent::CommunityJoined(parse_community(payload)?),
        "community_left" => PlatformEvent::CommunityLeft(parse_community(payload)?),
        "member_joined" => PlatformEvent::MemberJoined(parse_member(payload)?),
        "member_left" => PlatformEvent::MemberLeft(parse_member(payload)?),
        "invite_created" => PlatformEvent::InviteCreated(parse_invite(payload)?),
        "invite_deleted" => PlatformEvent::InviteDeleted(parse_invite(payload)?),
        _ => return Ok(None),
    };
    Ok(Some(event))
}
