pub mod collector;
pub mod percentiles;
pub mod pipeline;
pub mod stream;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

pub use collector::{MetricsCollector, MetricsSnapshot};
pub use pipeline::Telemetry;

/// One instrumentation record per completed call.
///
/// Built by the call instrumentor immediately after the wrapped
/// handler returns, handed to the sink, and discarded — nothing keeps
/// per-call history outside the sink.
#[derive(Debug, Clone)]
pub struct Measurement {
    /// Fully qualified call name, e.g. `"GET /api/students/:name"`.
    pub method: String,
    /// Elapsed wall time between the pre- and post-handler instants.
    pub duration: Duration,
    /// Serialized request payload size in bytes.
    pub request_bytes: u64,
    /// Serialized response payload size in bytes; zero when the call
    /// failed and no response payload was produced.
    pub response_bytes: u64,
    /// Whether the wrapped handler failed.
    pub error: bool,
    /// Point in time at which the call completed.
    pub completed_at: DateTime<Utc>,
}

impl Measurement {
    /// Duration in the export unit (seconds, floating point).
    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// Where measurements go. One write per completed call; a failing
/// backend is the caller's problem only insofar as the error gets
/// logged — it never surfaces to the RPC layer.
pub trait MetricSink: Send + Sync + 'static {
    fn record(&self, measurement: &Measurement) -> Result<(), SinkError>;
}

/// A failed sink write.
#[derive(Debug)]
pub struct SinkError(String);

impl SinkError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for SinkError {}
