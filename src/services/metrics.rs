//! Metrics registry (C7): process-wide Prometheus series rendered on
//! demand in text exposition format at `/__metrics`.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, Registry, TextEncoder,
};

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = register_int_counter_vec!(
        "gateway_requests_total",
        "Total requests completed by the gateway",
        &["method", "route", "status"]
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).ok();
    counter
});

static REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = register_histogram_vec!(
        "gateway_request_duration_seconds",
        "Wall-clock duration from forwarder entry to forwarder exit",
        &["route"]
    )
    .unwrap();
    REGISTRY.register(Box::new(histogram.clone())).ok();
    histogram
});

static CONCURRENT_REQUESTS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = register_int_gauge!(
        "gateway_concurrent_requests",
        "Requests currently inside the forwarder"
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).ok();
    gauge
});

static RATE_LIMITED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = register_int_counter_vec!(
        "gateway_rate_limited_requests_total",
        "Requests rejected with 429 by the rate limiter",
        &["route"]
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).ok();
    counter
});

/// Observation surface used by the pipeline; kept separate from the static
/// series themselves so tests can call it without touching the process
/// registry's global state directly.
pub struct Metrics;

impl Metrics {
    pub fn record_request(method: &str, route: &str, status: u16) {
        REQUESTS_TOTAL
            .with_label_values(&[method, route, &status.to_string()])
            .inc();
    }

    pub fn observe_duration(route: &str, seconds: f64) {
        REQUEST_DURATION_SECONDS
            .with_label_values(&[route])
            .observe(seconds);
    }

    pub fn forwarder_entry() {
        CONCURRENT_REQUESTS.inc();
    }

    pub fn forwarder_exit() {
        CONCURRENT_REQUESTS.dec();
    }

    pub fn record_rate_limited(route: &str) {
        RATE_LIMITED_TOTAL.with_label_values(&[route]).inc();
    }

    /// Renders every registered series in Prometheus text exposition
    /// format for the `/__metrics` admin endpoint.
    pub fn render() -> String {
        // Force registration of every lazily-initialized series even if
        // this is the very first scrape before any traffic has touched them.
        Lazy::force(&REQUESTS_TOTAL);
        Lazy::force(&REQUEST_DURATION_SECONDS);
        Lazy::force(&CONCURRENT_REQUESTS);
        Lazy::force(&RATE_LIMITED_TOTAL);

        let metric_families = REGISTRY.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .expect("prometheus encoding is infallible for well-formed metrics");
        String::from_utf8(buffer).expect("prometheus text encoder always emits valid utf-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_series_names() {
        Metrics::record_request("GET", "/users", 200);
        Metrics::observe_duration("/users", 0.01);
        Metrics::forwarder_entry();
        Metrics::forwarder_exit();
        Metrics::record_rate_limited("/users");

        let text = Metrics::render();
        assert!(text.contains("gateway_requests_total"));
        assert!(text.contains("gateway_request_duration_seconds"));
        assert!(text.contains("gateway_concurrent_requests"));
        assert!(text.contains("gateway_rate_limited_requests_total"));
    }
}
