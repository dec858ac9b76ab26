use std::future::Future;
use std::time::Instant;

use axum::{
    body::{to_bytes, Body},
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{debug, warn};

use crate::handlers::AppError;
use crate::metrics::{Measurement, Telemetry};

/// Router-wide call instrumentation. Wraps every registered route —
/// no per-method configuration — and emits exactly one `Measurement`
/// per handled call, success or failure. The handler's response passes
/// through unchanged; telemetry failures are logged and swallowed.
pub async fn instrument(
    State(telemetry): State<Telemetry>,
    req: Request,
    next: Next,
) -> Response {
    // Fully qualified call name: "VERB /route/pattern". The matched
    // route pattern keeps path parameters symbolic, so all calls to
    // one method share one identifier.
    let verb = req.method().clone();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());
    let call = format!("{verb} {route}");

    // Buffer the request body to measure the exact payload size, then
    // hand the handler an equivalent request.
    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%call, %err, "failed to read request body");
            let response =
                AppError::BadRequest("unreadable request body".into()).into_response();
            return measure(call, 0, &telemetry, async move { response }).await;
        }
    };
    let request_bytes = bytes.len() as u64;
    let req = Request::from_parts(parts, Body::from(bytes));

    measure(call, request_bytes, &telemetry, next.run(req)).await
}

/// Measurement core: times the invocation, sizes the response payload,
/// classifies the outcome, emits one `Measurement`, and returns the
/// invocation's response untouched.
pub(crate) async fn measure<F>(
    call: String,
    request_bytes: u64,
    telemetry: &Telemetry,
    invoke: F,
) -> Response
where
    F: Future<Output = Response>,
{
    let start = Instant::now();
    let response = invoke.await;
    let duration = start.elapsed();

    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.unwrap_or_default();

    let error = !parts.status.is_success();
    // A failed call produced a failure indicator, not a response
    // payload; its response size is reported as zero.
    let response_bytes = if error { 0 } else { bytes.len() as u64 };

    debug!(
        %call,
        us = duration.as_micros() as u64,
        status = parts.status.as_u16(),
        "handled"
    );

    telemetry.emit(Measurement {
        method: call,
        duration,
        request_bytes,
        response_bytes,
        error,
        completed_at: Utc::now(),
    });

    Response::from_parts(parts, Body::from(bytes))
}

// ─── Tests ───────────────────────────────────────────────────────
