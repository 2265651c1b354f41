//! HTTP request handlers for the dashboard.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Html;
use axum::Json;
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use hypermind_gossip::GossipEngine;

use super::types::{OptInResponse, StatsSnapshot};
use crate::broadcast::Broadcaster;
use crate::geo::GeoClient;
use crate::service::{NodeService, OptInState, StatsSource};

/// Shared state for HTTP handlers; cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub stats: StatsSource,
    pub broadcaster: Arc<Broadcaster>,
    pub engine: Arc<GossipEngine>,
    pub optin: Arc<OptInState>,
    pub geo: GeoClient,
}

impl AppState {
    pub fn from_service(service: &Arc<NodeService>) -> Self {
        Self {
            stats: service.stats(),
            broadcaster: service.broadcaster().clone(),
            engine: service.engine().clone(),
            optin: service.optin().clone(),
            geo: service.geo().clone(),
        }
    }
}

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>hypermind</title>
<style>
  body { font-family: system-ui, sans-serif; background: #0b0e14; color: #e6e6e6;
         display: flex; flex-direction: column; align-items: center;
         justify-content: center; min-height: 100vh; margin: 0; }
  h1 { font-weight: 400; letter-spacing: 0.2em; color: #8aa0c0; }
  #count { font-size: 7rem; font-variant-numeric: tabular-nums; margin: 0.2em 0; }
  .sub { color: #667; }
  #direct { color: #8aa0c0; }
</style>
</head>
<body>
<h1>hypermind</h1>
<div id="count">{{count}}</div>
<div class="sub">active nodes &middot; <span id="direct">0</span> direct</div>
<script>
  const source = new EventSource('/events');
  source.onmessage = (e) => {
    const stats = JSON.parse(e.data);
    document.getElementById('count').textContent = stats.count;
    document.getElementById('direct').textContent = stats.direct;
  };
</script>
</body>
</html>
"#;

/// Landing page with the count rendered server-side, so the first paint is
/// correct even before the event stream connects.
pub async fn landing(State(state): State<AppState>) -> Html<String> {
    let count = state.stats.snapshot().count;
    Html(INDEX_HTML.replace("{{count}}", &count.to_string()))
}

/// Server-sent-events stream of dashboard snapshots.
///
/// New subscribers get an immediate snapshot, then throttled pushes.
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.broadcaster.subscribe();
    let initial = state.stats.snapshot();

    let stream = async_stream::stream! {
        yield Ok(snapshot_event(&initial));
        loop {
            match rx.recv().await {
                Ok(snapshot) => yield Ok(snapshot_event(&snapshot)),
                // A slow consumer missed some pushes; the next one carries
                // the current state anyway.
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// One-shot snapshot, for pollers and the test suite.
pub async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}

/// Enable location sharing: look up coarse coordinates, attach them to
/// future heartbeats, and push a forced dashboard refresh.
pub async fn location_optin(State(state): State<AppState>) -> Json<OptInResponse> {
    let location = match state.geo.lookup().await {
        Ok(loc) => {
            info!(city = %loc.city, "location sharing enabled");
            state.engine.set_own_location(loc.clone());
            Some(loc)
        }
        Err(e) => {
            warn!(error = %e, "location lookup failed; opted in without coordinates");
            None
        }
    };

    state.optin.set(location.clone());
    state.broadcaster.force();

    Json(OptInResponse {
        success: true,
        has_location: location.is_some(),
        location,
    })
}

fn snapshot_event(snapshot: &StatsSnapshot) -> Event {
    Event::default().data(serde_json::to_string(snapshot).unwrap_or_default())
}
