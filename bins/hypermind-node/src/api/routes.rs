//! Route table for the dashboard.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{events, landing, location_optin, stats, AppState};

/// Build the dashboard router.
///
/// - `GET /` — landing page, count server-rendered
/// - `GET /events` — server-sent-events stream of snapshots
/// - `GET /api/stats` — one snapshot as JSON
/// - `POST /api/location-optin` — enable location sharing
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/events", get(events))
        .route("/api/stats", get(stats))
        .route("/api/location-optin", post(location_optin))
        .with_state(state)
}
