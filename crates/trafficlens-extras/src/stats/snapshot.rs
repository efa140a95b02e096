//! Aggregated views over the sample window

use super::sample::RequestSample;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// One entry of the slowest-requests list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlowRequest {
    /// Request URL
    pub url: String,
    /// Elapsed milliseconds, rounded to 2 decimals
    pub elapsed: f64,
    /// Response content type
    pub content_type: Option<String>,
    /// Response content length
    pub content_length: Option<u64>,
    /// HTTP method
    pub method: String,
    /// Response status
    pub status_code: u16,
}

impl From<&RequestSample> for SlowRequest {
    fn from(sample: &RequestSample) -> Self {
        Self {
            url: sample.url.clone(),
            elapsed: round_to(sample.elapsed_ms, 2),
            content_type: sample.content_type.clone(),
            content_length: sample.content_length,
            method: sample.method.clone(),
            status_code: sample.status,
        }
    }
}

/// Summary of the sample window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedStats {
    /// Mean elapsed milliseconds
    pub avg_response_time: f64,
    /// Largest elapsed milliseconds
    pub max_response_time: f64,
    /// Smallest elapsed milliseconds
    pub min_response_time: f64,
    /// Number of samples in the window
    pub total_requests: usize,
    /// Slowest samples, slowest first
    pub most_long_requests: Vec<SlowRequest>,
}

/// Counters kept beside the window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtendedMetrics {
    /// Requests recorded since start or reset
    pub total_requests_processed: u64,
    /// Requests with a success status
    pub successful_requests: u64,
    /// `total_requests_processed - successful_requests`
    pub failed_requests: u64,
    /// Success share in percent, 2 decimals
    pub success_rate_percent: f64,
    /// Throughput since start or reset, 3 decimals
    pub requests_per_second: f64,
    /// Seconds since start or reset, 2 decimals
    pub uptime_seconds: f64,
    /// Samples currently in the window
    pub window_size: usize,
    /// Window capacity
    pub window_max_size: usize,
}

/// Window summary plus running counters, as published to the holder.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtendedStats {
    /// Window summary
    pub basic_stats: AggregatedStats,
    /// Running counters
    pub extended_metrics: ExtendedMetrics,
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Cheap content fingerprint of a window copy.
pub fn fingerprint(samples: &[RequestSample]) -> u64 {
    let mut hasher = DefaultHasher::new();
    samples.hash(&mut hasher);
    hasher.finish()
}

/// Summarize `samples`, listing the `slowest` slowest.
///
/// Ties in elapsed time keep window order.
pub fn compute_snapshot(samples: &[RequestSample], slowest: usize) -> AggregatedStats {
    if samples.is_empty() {
        return AggregatedStats::default();
    }

    let mut by_elapsed: Vec<&RequestSample> = samples.iter().collect();
    by_elapsed.sort_by(|a, b| b.elapsed_ms.total_cmp(&a.elapsed_ms));

    let (sum, min, max) = samples.iter().fold(
        (0.0, f64::INFINITY, f64::NEG_INFINITY),
        |(sum, min, max), s| (sum + s.elapsed_ms, min.min(s.elapsed_ms), max.max(s.elapsed_ms)),
    );

    AggregatedStats {
        avg_response_time: round_to(sum / samples.len() as f64, 2),
        max_response_time: round_to(max, 2),
        min_response_time: round_to(min, 2),
        total_requests: samples.len(),
        most_long_requests: by_elapsed
            .into_iter()
            .take(slowest)
            .map(SlowRequest::from)
            .collect(),
    }
}
