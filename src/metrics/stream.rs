use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use super::collector::MetricsSnapshot;
use crate::store::RecordStore;
use crate::AppState;

// ─── GET /api/metrics ────────────────────────────────────────────
/// Returns a single JSON snapshot — useful for curl / debugging.

pub async fn get_metrics<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<MetricsSnapshot> {
    let mut snapshot = state.collector.snapshot();
    snapshot.dropped_measurements = state.telemetry.dropped();
    Json(snapshot)
}

// ─── GET /api/metrics/stream ─────────────────────────────────────
/// Server-Sent Events endpoint pushing a full `MetricsSnapshot` as
/// JSON every 500 ms.

pub async fn metrics_stream<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let interval = tokio::time::interval(Duration::from_millis(500));

    let stream = IntervalStream::new(interval).map(move |_| {
        let mut snapshot = state.collector.snapshot();
        snapshot.dropped_measurements = state.telemetry.dropped();
        let json = serde_json::to_string(&snapshot).unwrap_or_default();
        Ok(Event::default().data(json))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
