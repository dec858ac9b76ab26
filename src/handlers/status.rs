use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

// ─── GET /api/status ─────────────────────────────────────────────
/// Liveness check. Answers as long as the process is serving.

pub async fn check_status() -> Json<StatusResponse> {
    Json(StatusResponse { status: "Up" })
}
