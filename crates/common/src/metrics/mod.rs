//! Metrics and observability utilities
//!
//! Prometheus metrics for ingestion, search, oracle calls and the HTTP
//! layer, all under a common prefix.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Skillgraph metrics
pub const METRICS_PREFIX: &str = "skillgraph";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
];

/// Buckets for a full inference run (network fetch + search)
pub const INFERENCE_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_records_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Activity records turned into graph structure"
    );

    describe_counter!(
        format!("{}_records_skipped_total", METRICS_PREFIX),
        Unit::Count,
        "Malformed activity records skipped"
    );

    describe_gauge!(
        format!("{}_graph_nodes", METRICS_PREFIX),
        Unit::Count,
        "Nodes in the most recently built graph"
    );

    // Search metrics
    describe_counter!(
        format!("{}_search_iterations_total", METRICS_PREFIX),
        Unit::Count,
        "MCTS simulations executed"
    );

    describe_counter!(
        format!("{}_search_paths_total", METRICS_PREFIX),
        Unit::Count,
        "Distinct completed expertise paths"
    );

    // Oracle metrics
    describe_counter!(
        format!("{}_oracle_calls_total", METRICS_PREFIX),
        Unit::Count,
        "Scoring oracle calls by outcome"
    );

    describe_histogram!(
        format!("{}_oracle_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Scoring oracle latency in seconds"
    );

    // Inference metrics
    describe_counter!(
        format!("{}_inference_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Inference runs by outcome"
    );

    describe_histogram!(
        format!("{}_inference_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Inference run latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record ingestion metrics
pub fn record_ingestion(ingested: usize, skipped: usize, node_count: usize) {
    counter!(format!("{}_records_ingested_total", METRICS_PREFIX)).increment(ingested as u64);
    counter!(format!("{}_records_skipped_total", METRICS_PREFIX)).increment(skipped as u64);
    gauge!(format!("{}_graph_nodes", METRICS_PREFIX)).set(node_count as f64);
}

/// Helper to record one finished skill search
pub fn record_search(skill: &str, iterations: usize, paths: usize) {
    counter!(
        format!("{}_search_iterations_total", METRICS_PREFIX),
        "skill" => skill.to_string()
    )
    .increment(iterations as u64);

    counter!(
        format!("{}_search_paths_total", METRICS_PREFIX),
        "skill" => skill.to_string()
    )
    .increment(paths as u64);
}

/// Helper to record a scoring oracle call (`ok`, `timeout` or `error`)
pub fn record_oracle(duration_secs: f64, provider: &str, outcome: &str) {
    counter!(
        format!("{}_oracle_calls_total", METRICS_PREFIX),
        "provider" => provider.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_oracle_duration_seconds", METRICS_PREFIX),
        "provider" => provider.to_string()
    )
    .record(duration_secs);
}

/// Helper to record an inference run (`completed`, `cancelled` or `failed`)
pub fn record_inference(duration_secs: f64, outcome: &str) {
    counter!(
        format!("{}_inference_runs_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(format!("{}_inference_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [LATENCY_BUCKETS, INFERENCE_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        let metrics = RequestMetrics::start("GET", "/v2/health");
        metrics.finish(200);
        record_search("rust", 64, 3);
        record_oracle(0.01, "lexical", "ok");
        record_inference(1.2, "completed");
        // Just verify it runs without panic
    }
}
