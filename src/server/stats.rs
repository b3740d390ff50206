//! Invite statistics endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use super::AppState;
use crate::persistence::{PersistenceError, validate_path_component};
use crate::platform::{ChannelResolver, Notifier, PlatformApi};
use crate::settings::SettingsStore;
use crate::types::{CommunityId, InviteStats};

/// Errors that can occur serving statistics.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("no invite data for community {0}")]
    NotFound(CommunityId),

    #[error("{0}")]
    Persistence(#[from] PersistenceError),

    #[error("stats task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for StatsError {
    fn into_response(self) -> Response {
        let status = match &self {
            StatsError::NotFound(_) => StatusCode::NOT_FOUND,
            StatsError::Persistence(PersistenceError::InvalidPathComponent(_)) => {
                StatusCode::BAD_REQUEST
            }
            StatsError::Persistence(_) | StatsError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// `GET /api/v1/communities/{community}/stats`
///
/// Returns [`InviteStats`] as JSON, or 404 if nothing was ever recorded for
/// the community.
pub async fn stats_handler<P, S, R, N>(
    State(app_state): State<AppState<P, S, R, N>>,
    Path(community): Path<String>,
) -> Result<Json<InviteStats>, StatsError>
where
    P: PlatformApi + 'static,
    S: SettingsStore + 'static,
    R: ChannelResolver + 'static,
    N: Notifier + 'static,
{
    validate_path_component(&community)?;
    let community = CommunityId::new(community);

    let store = Arc::clone(app_state.engine().store());
    tokio::task::spawn_blocking(move || {
        if !store.has_ledger(&community) {
            return Err(StatsError::NotFound(community));
        }
        Ok(Json(store.stats(&community)?))
    })
    .await?
}
