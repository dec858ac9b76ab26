use hdrhistogram::Histogram;
use serde::Serialize;

/// Percentile breakdown of one latency histogram, in microseconds.
#[derive(Debug, Clone, Serialize)]
pub struct PercentileSet {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub count: u64,
}

impl PercentileSet {
    pub fn from_histogram(hist: &Histogram<u64>) -> Self {
        if hist.len() == 0 {
            return Self::empty();
        }

        Self {
            min: hist.min(),
            max: hist.max(),
            mean: hist.mean(),
            p50: hist.value_at_percentile(50.0),
            p90: hist.value_at_percentile(90.0),
            p99: hist.value_at_percentile(99.0),
            count: hist.len(),
        }
    }

    /// All-zero placeholder for an empty histogram.
    pub fn empty() -> Self {
        Self {
            min: 0,
            max: 0,
            mean: 0.0,
            p50: 0,
            p90: 0,
            p99: 0,
            count: 0,
        }
    }
}
