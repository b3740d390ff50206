//! Push ingress for platform events.
//!
//! The gateway relays each platform event as a signed POST. The body is
//! verified, parsed and handed to the engine, which processes it on its own
//! task; the response goes out as soon as the event is queued.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::events::{ParseError, parse_event, verify_signature};
use crate::platform::{ChannelResolver, Notifier, PlatformApi};
use crate::settings::SettingsStore;

pub const HEADER_EVENT: &str = "x-event-type";
pub const HEADER_DELIVERY: &str = "x-delivery-id";
pub const HEADER_SIGNATURE: &str = "x-signature-256";

/// Errors that reject a pushed event.
#[derive(Debug, Error)]
pub enum IngressError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid event payload: {0}")]
    InvalidPayload(#[from] ParseError),
}

impl IntoResponse for IngressError {
    fn into_response(self) -> Response {
        let status = match &self {
            IngressError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            IngressError::InvalidSignature => StatusCode::UNAUTHORIZED,
            IngressError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, IngressError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or(IngressError::MissingHeader(name))
}

/// `POST /events`
///
/// - 202 Accepted: dispatched, or an event type this service ignores
/// - 400 Bad Request: missing header or malformed payload
/// - 401 Unauthorized: bad signature
pub async fn events_handler<P, S, R, N>(
    State(app_state): State<AppState<P, S, R, N>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), IngressError>
where
    P: PlatformApi + 'static,
    S: SettingsStore + 'static,
    R: ChannelResolver + 'static,
    N: Notifier + 'static,
{
    let event_type = get_header(&headers, HEADER_EVENT)?;
    let delivery_id = get_header(&headers, HEADER_DELIVERY)?;
    let signature = get_header(&headers, HEADER_SIGNATURE)?;

    if !verify_signature(&body, &signature, app_state.webhook_secret()) {
        warn!(delivery_id = %delivery_id, event_type = %event_type, "Invalid event signature");
        return Err(IngressError::InvalidSignature);
    }

    let Some(event) = parse_event(&event_type, &body)? else {
        debug!(delivery_id = %delivery_id, event_type = %event_type, "Ignoring unknown event type");
        return Ok((StatusCode::ACCEPTED, "Ignored"));
    };

    info!(
        delivery_id = %delivery_id,
        event_type = event.name(),
        community = event.community().map(|c| c.as_str()),
        "Dispatching event"
    );
    app_state.engine().dispatch(event);
    Ok((StatusCode::ACCEPTED, "Accepted"))
}
