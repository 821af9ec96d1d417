//! Prometheus metrics for the mock serving engine.
//!
//! Tracks served mock requests, route cache effectiveness, proxy forwarding,
//! callback dispatch, live subscriptions and background task outcomes.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

lazy_static! {
    /// Total number of mock requests served
    pub static ref MOCK_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "mockport_mock_requests_total",
        "Total number of requests served on the mock listener",
        &["method", "source", "status"]  // source: mock|rule|proxy|error
    )
    .unwrap();

    /// Mock request duration (including configured delays)
    pub static ref MOCK_REQUEST_DURATION_MS: HistogramVec = register_histogram_vec!(
        "mockport_mock_request_duration_ms",
        "Histogram of mock request handling time in milliseconds",
        &["source"],
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap();

    /// Route cache lookups
    pub static ref ROUTE_CACHE_LOOKUPS_TOTAL: CounterVec = register_counter_vec!(
        "mockport_route_cache_lookups_total",
        "Route cache lookups by result",
        &["backend", "result"]  // result: hit|miss|stale|error
    )
    .unwrap();

    /// Proxy forwarding duration
    pub static ref PROXY_REQUEST_DURATION_MS: HistogramVec = register_histogram_vec!(
        "mockport_proxy_request_duration_ms",
        "Duration of forwarded backend requests",
        &["outcome"],  // outcome: success|network|tls|timeout|invalid_target|response_body
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap();

    /// Callback invocations
    pub static ref CALLBACKS_TOTAL: CounterVec = register_counter_vec!(
        "mockport_callbacks_total",
        "Total number of callback invocations",
        &["result"]  // result: success|failure|error
    )
    .unwrap();

    /// Open broadcast subscriptions
    pub static ref ACTIVE_SUBSCRIPTIONS: Gauge = register_gauge!(
        "mockport_active_subscriptions",
        "Number of open real-time event subscriptions"
    )
    .unwrap();

    /// Background tasks
    pub static ref BACKGROUND_TASKS_TOTAL: CounterVec = register_counter_vec!(
        "mockport_background_tasks_total",
        "Background task submissions by queue and outcome",
        &["queue", "outcome"]  // outcome: queued|rejected|completed|panicked|cancelled
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# failed to encode metrics: {e}\n");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_mock_request(method: &str, source: &str, status: u16, duration_ms: f64) {
    MOCK_REQUESTS_TOTAL
        .with_label_values(&[method, source, &status.to_string()])
        .inc();
    MOCK_REQUEST_DURATION_MS
        .with_label_values(&[source])
        .observe(duration_ms);
}

pub fn record_route_cache(backend: &str, result: &str) {
    ROUTE_CACHE_LOOKUPS_TOTAL
        .with_label_values(&[backend, result])
        .inc();
}

pub fn record_proxy_request(outcome: &str, duration_ms: f64) {
    PROXY_REQUEST_DURATION_MS
        .with_label_values(&[outcome])
        .observe(duration_ms);
}

pub fn record_callback(result: &str) {
    CALLBACKS_TOTAL.with_label_values(&[result]).inc();
}

pub fn set_active_subscriptions(count: usize) {
    ACTIVE_SUBSCRIPTIONS.set(count as f64);
}

pub fn record_background_task(queue: &str, outcome: &str) {
    BACKGROUND_TASKS_TOTAL.with_label_values(&[queue, outcome]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collection() {
        record_mock_request("GET", "mock", 200, 1.2);
        record_route_cache("inmemory", "hit");
        record_proxy_request("success", 12.0);

        let metrics = collect_metrics();

        assert!(metrics.contains("mockport_mock_requests_total"));
        assert!(metrics.contains("mockport_route_cache_lookups_total"));
        assert!(metrics.contains("mockport_proxy_request_duration_ms"));
    }

    #[test]
    fn test_callback_and_background_metrics() {
        record_callback("success");
        record_callback("failure");
        record_background_task("events", "queued");
        set_active_subscriptions(3);

        let metrics = collect_metrics();
        assert!(metrics.contains("mockport_callbacks_total"));
        assert!(metrics.contains("mockport_background_tasks_total"));
        assert!(metrics.contains("mockport_active_subscriptions"));
    }
}
