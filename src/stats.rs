use crate::types::{LoadTestResult, RequestSample};
use hdrhistogram::Histogram;
use std::collections::HashMap;
use std::time::Duration;

/// Latencies are recorded in microseconds, up to two minutes.
const HISTOGRAM_MAX_MICROS: u64 = 120_000_000;

/// Counters and latencies accumulated over one run. Owned by the scheduler;
/// samples are folded in between batches.
#[derive(Debug, Default)]
pub struct Statistics {
    pub successful_requests: u32,
    pub failed_requests: u32,
    latencies: Vec<f64>,
    status_codes: HashMap<u16, u32>,
    errors: HashMap<String, u32>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: RequestSample) {
        if sample.is_success() {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }

        self.latencies.push(sample.latency_ms);

        if let Some(code) = sample.status_code {
            *self.status_codes.entry(code).or_insert(0) += 1;
        }
        if let Some(error) = sample.error {
            *self.errors.entry(error).or_insert(0) += 1;
        }
    }

    pub fn completed(&self) -> u32 {
        self.successful_requests + self.failed_requests
    }

    pub fn latencies(&self) -> &[f64] {
        &self.latencies
    }
}

pub struct StatisticsAggregator;

impl StatisticsAggregator {
    /// Final reduction of a run.
    pub fn summarize(stats: Statistics, duration: Duration, cancelled: bool) -> LoadTestResult {
        let total_requests = stats.completed();
        let duration_ms = duration.as_secs_f64() * 1000.0;
        let (avg, min, max) = latency_summary(stats.latencies());
        let (p50, p95, p99) = percentiles(stats.latencies());

        let requests_per_second = if duration_ms > 0.0 {
            total_requests as f64 / duration_ms * 1000.0
        } else {
            0.0
        };
        let success_rate_percent = if total_requests > 0 {
            stats.successful_requests as f64 / total_requests as f64 * 100.0
        } else {
            0.0
        };

        LoadTestResult {
            total_requests,
            success_count: stats.successful_requests,
            error_count: stats.failed_requests,
            duration_ms,
            avg_latency_ms: avg,
            min_latency_ms: min,
            max_latency_ms: max,
            p50_latency_ms: p50,
            p95_latency_ms: p95,
            p99_latency_ms: p99,
            requests_per_second,
            success_rate_percent,
            status_code_distribution: stats.status_codes,
            error_distribution: stats.errors,
            cancelled,
            error: None,
        }
    }
}

fn latency_summary(latencies: &[f64]) -> (f64, f64, f64) {
    if latencies.is_empty() {
        return (0.0, 0.0, 0.0);
    }

    let sum: f64 = latencies.iter().sum();
    let min = latencies.iter().copied().fold(f64::INFINITY, f64::min);
    let max = latencies.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    (sum / latencies.len() as f64, min, max)
}

fn percentiles(latencies: &[f64]) -> (f64, f64, f64) {
    let Ok(mut histogram) = Histogram::<u64>::new_with_bounds(1, HISTOGRAM_MAX_MICROS, 3) else {
        return (0.0, 0.0, 0.0);
    };

    for latency in latencies {
        histogram.saturating_record(((latency * 1000.0).round() as u64).max(1));
    }

    let at = |quantile: f64| -> f64 {
        if histogram.is_empty() {
            0.0
        } else {
            histogram.value_at_quantile(quantile) as f64 / 1000.0
        }
    };

    (at(0.50), at(0.95), at(0.99))
}
