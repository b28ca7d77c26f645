//! Read side of the observatory: the HTTP request and synthetic latency
//! summaries plus dispatcher health, as one JSON document or as a live feed.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::{Stream, StreamExt};

use super::MetricsSnapshot;
use crate::AppState;

/// Feed cadence. Several rotations fit in one window even for short
/// `SUMMARY_MAX_AGE_SECS`, so decay shows up as a smooth slope.
const FEED_INTERVAL: Duration = Duration::from_millis(500);

/// Two summary round trips. Each spins on the response queue, so the
/// runtime is told this worker is about to block.
fn capture(state: &AppState) -> MetricsSnapshot {
    tokio::task::block_in_place(|| MetricsSnapshot::capture(state))
}

/// `GET /api/metrics`: count, sum and p50/p90/p99 for both summaries,
/// whether the dispatcher is alive and how many requests it has queued.
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(capture(&state))
}

/// `GET /api/metrics/stream`: the same document as an SSE `data:` frame
/// every [`FEED_INTERVAL`]. Quantiles with an empty window arrive as `null`.
pub async fn metrics_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let frames = IntervalStream::new(tokio::time::interval(FEED_INTERVAL)).map(move |_| {
        let frame = match Event::default().json_data(capture(&state)) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(%err, "metrics frame not serializable");
                Event::default().comment("skipped")
            }
        };
        Ok(frame)
    });

    Sse::new(frames).keep_alive(KeepAlive::default())
}
