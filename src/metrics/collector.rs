use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

use chrono::{DateTime, Utc};
use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;

use super::percentiles::PercentileSet;
use super::{Measurement, MetricSink, SinkError};

// ─── Configuration ───────────────────────────────────────────────

/// How many individual call records we keep for the live feed
const MAX_RECENT: usize = 200;

/// Aggregate timeline resolution (one point per window)
const TIMELINE_WINDOW_MS: u64 = 500;

/// HdrHistogram range: 1 μs → 60 s, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe in-memory metric sink.
/// The exporter task calls `record()`, the export endpoints call
/// `snapshot()`.
pub struct MetricsCollector {
    inner: Mutex<Inner>,
}

/// One measurement in the export form: duration in seconds (floating
/// point), error flag, payload sizes, tagged with the method and the
/// unit of measure, timestamped at call completion.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedMeasurement {
    pub method: String,
    pub unit: &'static str,
    pub duration: f64,
    pub error: bool,
    pub request_bytes: u64,
    pub response_bytes: u64,
    pub completed_at: DateTime<Utc>,
}

/// Aggregates for one RPC method.
#[derive(Debug, Clone, Serialize)]
pub struct MethodStats {
    pub method: String,
    pub calls: u64,
    pub errors: u64,
    pub request_bytes: u64,
    pub response_bytes: u64,
    pub latency: PercentileSet,
}

/// One aggregated point on the timeline (per 500 ms window).
#[derive(Debug, Clone, Serialize)]
pub struct TimelinePoint {
    pub timestamp_ms: u64,
    pub avg_duration_us: f64,
    pub calls: u64,
    pub errors: u64,
}

/// A bucket in the latency distribution histogram.
#[derive(Debug, Clone, Serialize)]
pub struct DistBucket {
    pub range_start_us: u64,
    pub range_end_us: u64,
    pub count: u64,
}

/// Complete snapshot shipped on every export tick.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub latency: PercentileSet,
    pub per_method: Vec<MethodStats>,

    // Counters
    pub total_calls: u64,
    pub total_errors: u64,
    pub request_bytes: u64,
    pub response_bytes: u64,
    pub calls_per_sec: f64,
    pub elapsed_secs: f64,
    /// Measurements the pipeline shed because the queue was full.
    pub dropped_measurements: u64,

    // Visual data
    pub recent: Vec<ExportedMeasurement>,
    pub timeline: Vec<TimelinePoint>,
    pub distribution: Vec<DistBucket>,
}

// ─── Internal state ──────────────────────────────────────────────

struct Inner {
    latency_hist: Histogram<u64>,
    methods: BTreeMap<String, MethodAccum>,

    total_calls: u64,
    total_errors: u64,
    request_bytes: u64,
    response_bytes: u64,

    recent: VecDeque<ExportedMeasurement>,

    timeline: Vec<TimelinePoint>,
    current_window: Option<WindowAccumulator>,

    // Wall-clock anchor for elapsed time
    start_time: Option<Instant>,
}

struct MethodAccum {
    hist: Histogram<u64>,
    calls: u64,
    errors: u64,
    request_bytes: u64,
    response_bytes: u64,
}

/// Running totals for the current timeline window.
struct WindowAccumulator {
    window_start_ms: u64,
    duration_sum_us: u64,
    calls: u64,
    errors: u64,
}

fn new_hist() -> Histogram<u64> {
    Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
        .expect("histogram creation")
}

// ─── MetricsCollector impl ───────────────────────────────────────

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Produce a read-only snapshot for the export endpoints.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().snapshot()
    }
}

impl MetricSink for MetricsCollector {
    fn record(&self, measurement: &Measurement) -> Result<(), SinkError> {
        self.inner.lock().observe(measurement);
        Ok(())
    }
}

// ─── Inner impl ──────────────────────────────────────────────────

impl Inner {
    fn new() -> Self {
        Self {
            latency_hist: new_hist(),
            methods: BTreeMap::new(),
            total_calls: 0,
            total_errors: 0,
            request_bytes: 0,
            response_bytes: 0,
            recent: VecDeque::with_capacity(MAX_RECENT + 1),
            timeline: Vec::with_capacity(1024),
            current_window: None,
            start_time: None,
        }
    }

    fn observe(&mut self, m: &Measurement) {
        // Lazily set the anchor on the very first measurement
        let start = *self.start_time.get_or_insert_with(Instant::now);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        // Histograms clamp to ≥ 1 μs
        let duration_us = (m.duration.as_micros() as u64).max(1);

        // ── Counters ────────────────────────────────────────────
        self.total_calls += 1;
        if m.error {
            self.total_errors += 1;
        }
        self.request_bytes += m.request_bytes;
        self.response_bytes += m.response_bytes;

        let _ = self.latency_hist.record(duration_us);

        // ── Per-method aggregates ───────────────────────────────
        let accum = self
            .methods
            .entry(m.method.clone())
            .or_insert_with(|| MethodAccum {
                hist: new_hist(),
                calls: 0,
                errors: 0,
                request_bytes: 0,
                response_bytes: 0,
            });
        accum.calls += 1;
        if m.error {
            accum.errors += 1;
        }
        accum.request_bytes += m.request_bytes;
        accum.response_bytes += m.response_bytes;
        let _ = accum.hist.record(duration_us);

        // ── Timeline aggregation ────────────────────────────────
        self.push_to_timeline(elapsed_ms, duration_us, m.error);

        // ── Live feed ───────────────────────────────────────────
        self.recent.push_back(ExportedMeasurement {
            method: m.method.clone(),
            unit: "seconds",
            duration: m.duration_secs(),
            error: m.error,
            request_bytes: m.request_bytes,
            response_bytes: m.response_bytes,
            completed_at: m.completed_at,
        });
        if self.recent.len() > MAX_RECENT {
            self.recent.pop_front();
        }
    }

    /// Bucket the measurement into the current window, or roll over.
    fn push_to_timeline(&mut self, elapsed_ms: u64, duration_us: u64, error: bool) {
        let window_start = (elapsed_ms / TIMELINE_WINDOW_MS) * TIMELINE_WINDOW_MS;
        let errors = u64::from(error);

        match &mut self.current_window {
            Some(w) if w.window_start_ms == window_start => {
                w.duration_sum_us += duration_us;
                w.calls += 1;
                w.errors += errors;
            }
            Some(_) => {
                let old = self.current_window.take().unwrap();
                self.finalize_window(old);
                self.current_window = Some(WindowAccumulator {
                    window_start_ms: window_start,
                    duration_sum_us: duration_us,
                    calls: 1,
                    errors,
                });
            }
            None => {
                self.current_window = Some(WindowAccumulator {
                    window_start_ms: window_start,
                    duration_sum_us: duration_us,
                    calls: 1,
                    errors,
                });
            }
        }
    }

    fn finalize_window(&mut self, w: WindowAccumulator) {
        if w.calls == 0 {
            return;
        }
        self.timeline.push(TimelinePoint {
            timestamp_ms: w.window_start_ms,
            avg_duration_us: w.duration_sum_us as f64 / w.calls as f64,
            calls: w.calls,
            errors: w.errors,
        });
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let elapsed_secs = self
            .start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);

        let cps = if elapsed_secs > 0.0 {
            self.total_calls as f64 / elapsed_secs
        } else {
            0.0
        };

        // Include the current (partial) window in the timeline
        let mut timeline = self.timeline.clone();
        if let Some(w) = &self.current_window {
            if w.calls > 0 {
                timeline.push(TimelinePoint {
                    timestamp_ms: w.window_start_ms,
                    avg_duration_us: w.duration_sum_us as f64 / w.calls as f64,
                    calls: w.calls,
                    errors: w.errors,
                });
            }
        }

        let per_method = self
            .methods
            .iter()
            .map(|(method, a)| MethodStats {
                method: method.clone(),
                calls: a.calls,
                errors: a.errors,
                request_bytes: a.request_bytes,
                response_bytes: a.response_bytes,
                latency: PercentileSet::from_histogram(&a.hist),
            })
            .collect();

        MetricsSnapshot {
            latency: PercentileSet::from_histogram(&self.latency_hist),
            per_method,
            total_calls: self.total_calls,
            total_errors: self.total_errors,
            request_bytes: self.request_bytes,
            response_bytes: self.response_bytes,
            calls_per_sec: cps,
            elapsed_secs,
            dropped_measurements: 0,
            recent: self.recent.iter().cloned().collect(),
            timeline,
            distribution: Self::compute_distribution(&self.latency_hist),
        }
    }

    // ── Distribution histogram ──────────────────────────────────

    /// Pre-defined bucket boundaries (μs), sized for a local-network
    /// store round-trip plus handler overhead.
    const DIST_BOUNDARIES: &'static [u64] = &[
        50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 25_000, 50_000,
        100_000, 250_000, 1_000_000,
    ];

    fn compute_distribution(hist: &Histogram<u64>) -> Vec<DistBucket> {
        if hist.len() == 0 {
            return Vec::new();
        }

        let bounds = Self::DIST_BOUNDARIES;
        let mut counts = vec![0u64; bounds.len() + 1];

        // Walk every recorded value and find its bucket
        for iv in hist.iter_recorded() {
            let val = iv.value_iterated_to();
            let cnt = iv.count_at_value();

            let idx = match bounds.binary_search(&val) {
                Ok(i) => i,
                Err(i) => i,
            };
            counts[idx.min(bounds.len())] += cnt;
        }

        let mut result = Vec::with_capacity(counts.len());
        let mut prev = 0u64;
        for (i, &boundary) in bounds.iter().enumerate() {
            if counts[i] > 0 {
                result.push(DistBucket {
                    range_start_us: prev,
                    range_end_us: boundary,
                    count: counts[i],
                });
            }
            prev = boundary;
        }
        // Overflow bucket
        if counts[bounds.len()] > 0 {
            result.push(DistBucket {
                range_start_us: prev,
                range_end_us: hist.max(),
                count: counts[bounds.len()],
            });
        }

        result
    }
}

// ─── Tests ───────────────────────────────────────────────────────
