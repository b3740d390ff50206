//! HTTP server for the invite tracker.
//!
//! # Endpoints
//!
//! - `POST /events` - Accepts signed platform events (returns 202 Accepted)
//! - `GET /api/v1/communities/{community}/stats` - Invite statistics as JSON
//! - `GET /health` - Returns 200 if the server is running

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

pub mod events;
pub mod health;
pub mod stats;

pub use events::{HEADER_DELIVERY, HEADER_EVENT, HEADER_SIGNATURE, IngressError, events_handler};
pub use health::health_handler;
pub use stats::{StatsError, stats_handler};

use crate::engine::Orchestrator;
use crate::platform::{ChannelResolver, Notifier, PlatformApi};
use crate::settings::SettingsStore;

/// Shared application state, handed to handlers through axum's `State`.
pub struct AppState<P, S, R, N> {
    inner: Arc<AppStateInner<P, S, R, N>>,
}

struct AppStateInner<P, S, R, N> {
    engine: Orchestrator<P, S, R, N>,

    /// Shared secret for HMAC-SHA256 body signatures.
    webhook_secret: Vec<u8>,
}

impl<P, S, R, N> Clone for AppState<P, S, R, N> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, S, R, N> AppState<P, S, R, N> {
    pub fn new(engine: Orchestrator<P, S, R, N>, webhook_secret: impl Into<Vec<u8>>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                engine,
                webhook_secret: webhook_secret.into(),
            }),
        }
    }

    pub fn engine(&self) -> &Orchestrator<P, S, R, N> {
        &self.inner.engine
    }

    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }
}

/// Builds the router with all endpoints.
pub fn build_router<P, S, R, N>(app_state: AppState<P, S, R, N>) -> Router
where
    P: PlatformApi + 'static,
    S: SettingsStore + 'static,
    R: ChannelResolver + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/events", post(events_handler::<P, S, R, N>))
        .route(
            "/api/v1/communities/{community}/stats",
            get(stats_handler::<P, S, R, N>),
        )
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
