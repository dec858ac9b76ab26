use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers::{status, students};
use crate::metrics::stream;
use crate::middleware::instrument;
use crate::store::RecordStore;
use crate::AppState;

/// Builds the full Axum `Router`: the CRUD surface, the liveness
/// check, the metrics export endpoints, and the call-instrumentation
/// middleware applied uniformly over every route.
pub fn create_router<S: RecordStore>(state: Arc<AppState<S>>) -> Router {
    let telemetry = state.telemetry.clone();

    Router::new()
        // ── Student records ─────────────────────────────────────
        .route("/api/students", post(students::create_student::<S>))
        .route(
            "/api/students/:name",
            get(students::get_student::<S>)
                .put(students::update_student::<S>)
                .delete(students::delete_student::<S>),
        )
        // ── Liveness ────────────────────────────────────────────
        .route("/api/status", get(status::check_status))
        // ── Metrics export ──────────────────────────────────────
        .route("/api/metrics", get(stream::get_metrics::<S>))
        .route("/api/metrics/stream", get(stream::metrics_stream::<S>))
        // ── Provide shared state to all routes above ────────────
        .with_state(state)
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn_with_state(telemetry, instrument::instrument))
        .layer(CorsLayer::permissive())
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{pipeline, MetricsCollector};
    use crate::store::mem::MemStore;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn spawn_service() -> (SocketAddr, Arc<AppState<MemStore>>) {
        let collector = Arc::new(MetricsCollector::new());
        let telemetry = pipeline::spawn_exporter(collector.clone(), 64);
        let state = Arc::new(AppState {
            store: MemStore::new(),
            collector,
            telemetry,
        });

        let app = create_router(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (addr, state)
    }

    fn raw_request(method: &str, path: &str, body: Option<&str>) -> String {
        match body {
            Some(body) => format!(
                "{method} {path} HTTP/1.1\r\nHost: localhost\r\n\
                 Content-Type: application/json\r\nContent-Length: {}\r\n\
                 Connection: close\r\n\r\n{body}",
                body.len()
            ),
            None => format!(
                "{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
            ),
        }
    }

    /// Minimal raw-socket HTTP client: one request, one response.
    async fn exchange(addr: SocketAddr, request: String) -> (u16, String) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let text = String::from_utf8_lossy(&raw).into_owned();

        let status = text
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .expect("status line");
        let body = text
            .split_once("\r\n\r\n")
            .map(|(_, body)| body.to_owned())
            .unwrap_or_default();
        (status, body)
    }

    async fn wait_for_calls(state: &Arc<AppState<MemStore>>, want: u64) {
        for _ in 0..200 {
            if state.collector.snapshot().total_calls >= want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "collector saw {} calls, wanted {want}",
            state.collector.snapshot().total_calls
        );
    }

    #[tokio::test]
    async fn crud_flow_with_instrumented_telemetry() {
        let (addr, state) = spawn_service().await;

        let ada = r#"{"name":"Ada","age":"23","commute_method":"bike","college":"Engineering","hobbies":"chess"}"#;

        // Create
        let (status, body) =
            exchange(addr, raw_request("POST", "/api/students", Some(ada))).await;
        assert_eq!(status, 201);
        assert!(body.contains("\"name\":\"Ada\""));

        // Read back
        let (status, body) =
            exchange(addr, raw_request("GET", "/api/students/Ada", None)).await;
        assert_eq!(status, 200);
        let fetched: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(fetched["college"], "Engineering");

        // Read a row that does not exist
        let (status, _) =
            exchange(addr, raw_request("GET", "/api/students/Bob", None)).await;
        assert_eq!(status, 404);

        // Update
        let moved = r#"{"name":"Ada","age":"24","commute_method":"bus","college":"Mathematics","hobbies":"chess"}"#;
        let (status, body) =
            exchange(addr, raw_request("PUT", "/api/students/Ada", Some(moved))).await;
        assert_eq!(status, 200);
        assert!(body.contains("\"college\":\"Mathematics\""));

        // Delete
        let (status, body) =
            exchange(addr, raw_request("DELETE", "/api/students/Ada", None)).await;
        assert_eq!(status, 200);
        assert!(body.contains("\"success\":true"));
        assert_eq!(state.store.fetch("Ada").await.unwrap(), None);

        // Liveness
        let (status, body) = exchange(addr, raw_request("GET", "/api/status", None)).await;
        assert_eq!(status, 200);
        assert!(body.contains("\"status\":\"Up\""));

        // Every call above produced exactly one measurement.
        wait_for_calls(&state, 6).await;
        let snap = state.collector.snapshot();
        assert_eq!(snap.total_calls, 6);
        assert_eq!(snap.total_errors, 1);

        // Calls are tagged with the route pattern, not the raw path.
        let get_stats = snap
            .per_method
            .iter()
            .find(|m| m.method == "GET /api/students/:name")
            .expect("per-method stats for the read route");
        assert_eq!(get_stats.calls, 2);
        assert_eq!(get_stats.errors, 1);

        // Request payload size is the exact serialized byte count.
        let post_stats = snap
            .per_method
            .iter()
            .find(|m| m.method == "POST /api/students")
            .unwrap();
        assert_eq!(post_stats.request_bytes, ada.len() as u64);
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let (addr, _state) = spawn_service().await;
        let row = r#"{"name":"Grace"}"#;

        let (status, _) =
            exchange(addr, raw_request("POST", "/api/students", Some(row))).await;
        assert_eq!(status, 201);

        let (status, body) =
            exchange(addr, raw_request("POST", "/api/students", Some(row))).await;
        assert_eq!(status, 409);
        assert!(body.contains("already exists"));
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_a_snapshot() {
        let (addr, state) = spawn_service().await;

        let (status, _) = exchange(addr, raw_request("GET", "/api/status", None)).await;
        assert_eq!(status, 200);
        wait_for_calls(&state, 1).await;

        // The snapshot itself is served (and instrumented like any
        // other call).
        let (status, body) = exchange(addr, raw_request("GET", "/api/metrics", None)).await;
        assert_eq!(status, 200);
        let snap: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(snap["total_calls"].as_u64().unwrap() >= 1);
        assert_eq!(snap["dropped_measurements"], 0);
    }
}
