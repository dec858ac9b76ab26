use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use super::{Measurement, MetricSink};

/// Handle the instrumented request path uses to hand off measurements.
///
/// The hand-off is a bounded, non-blocking `try_send`: a slow or
/// unreachable sink can never add latency to a user-facing call. When
/// the queue is full the measurement is dropped and counted.
#[derive(Clone)]
pub struct Telemetry {
    tx: mpsc::Sender<Measurement>,
    dropped: Arc<AtomicU64>,
}

impl Telemetry {
    fn new(tx: mpsc::Sender<Measurement>) -> Self {
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueue one measurement. Never blocks, never fails the caller.
    pub fn emit(&self, measurement: Measurement) {
        match self.tx.try_send(measurement) {
            Ok(()) => {}
            Err(TrySendError::Full(m)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    method = %m.method,
                    dropped_total = total,
                    "telemetry queue full, measurement dropped"
                );
            }
            Err(TrySendError::Closed(m)) => {
                debug!(method = %m.method, "telemetry exporter gone, measurement dropped");
            }
        }
    }

    /// Measurements dropped so far because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Spawns the exporter task draining the queue into `sink` and returns
/// the sending handle. Sink failures are logged and swallowed; each
/// call's telemetry is independent best-effort, never retried.
pub fn spawn_exporter(sink: Arc<dyn MetricSink>, queue_capacity: usize) -> Telemetry {
    let (tx, mut rx) = mpsc::channel::<Measurement>(queue_capacity);

    tokio::spawn(async move {
        while let Some(measurement) = rx.recv().await {
            if let Err(err) = sink.record(&measurement) {
                warn!(method = %measurement.method, %err, "metric sink write failed");
            }
        }
    });

    Telemetry::new(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::SinkError;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn sample(method: &str) -> Measurement {
        Measurement {
            method: method.into(),
            duration: Duration::from_millis(2),
            request_bytes: 10,
            response_bytes: 20,
            error: false,
            completed_at: Utc::now(),
        }
    }

    struct CaptureSink(Mutex<Vec<Measurement>>);

    impl MetricSink for CaptureSink {
        fn record(&self, m: &Measurement) -> Result<(), SinkError> {
            self.0.lock().push(m.clone());
            Ok(())
        }
    }

    struct FailSink;

    impl MetricSink for FailSink {
        fn record(&self, _: &Measurement) -> Result<(), SinkError> {
            Err(SinkError::new("backend unreachable"))
        }
    }

    async fn drain() {
        // Give the exporter task a chance to run.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn exporter_forwards_measurements_to_sink() {
        let sink = Arc::new(CaptureSink(Mutex::new(Vec::new())));
        let telemetry = spawn_exporter(sink.clone(), 16);

        telemetry.emit(sample("GET /api/students/:name"));
        telemetry.emit(sample("POST /api/students"));
        drain().await;

        let seen = sink.0.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].method, "GET /api/students/:name");
        assert_eq!(seen[1].method, "POST /api/students");
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        // No exporter draining: build the handle over a raw channel.
        let (tx, mut rx) = mpsc::channel::<Measurement>(2);
        let telemetry = Telemetry::new(tx);

        telemetry.emit(sample("a"));
        telemetry.emit(sample("b"));
        telemetry.emit(sample("c"));

        assert_eq!(telemetry.dropped(), 1);
        assert_eq!(rx.recv().await.unwrap().method, "a");
        assert_eq!(rx.recv().await.unwrap().method, "b");
    }

    #[tokio::test]
    async fn sink_failures_are_swallowed() {
        let telemetry = spawn_exporter(Arc::new(FailSink), 16);

        telemetry.emit(sample("a"));
        drain().await;

        // The exporter survives the failure and keeps draining.
        telemetry.emit(sample("b"));
        drain().await;
        assert_eq!(telemetry.dropped(), 0);
    }
}
