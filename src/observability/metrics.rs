use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub api_requests_total: IntCounterVec,
    pub api_request_latency_seconds: HistogramVec,
    pub requests_in_flight: IntGauge,
    pub notifications_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let api_requests_total = IntCounterVec::new(
            Opts::new("api_requests_total", "Store operations by outcome"),
            &["store", "op", "outcome"],
        )
        .expect("valid api_requests_total metric");

        let api_request_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "api_request_latency_seconds",
                "Latency of store operations in seconds",
            ),
            &["store", "op"],
        )
        .expect("valid api_request_latency_seconds metric");

        let requests_in_flight =
            IntGauge::new("requests_in_flight", "Store operations awaiting a response")
                .expect("valid requests_in_flight metric");

        let notifications_total = IntCounterVec::new(
            Opts::new("notifications_total", "Notifications surfaced by level"),
            &["source", "level"],
        )
        .expect("valid notifications_total metric");

        registry
            .register(Box::new(api_requests_total.clone()))
            .expect("register api_requests_total");
        registry
            .register(Box::new(api_request_latency_seconds.clone()))
            .expect("register api_request_latency_seconds");
        registry
            .register(Box::new(requests_in_flight.clone()))
            .expect("register requests_in_flight");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");

        Self {
            registry,
            api_requests_total,
            api_request_latency_seconds,
            requests_in_flight,
            notifications_total,
        }
    }

    pub fn observe(&self, store: &str, op: &str, outcome: &str, elapsed: Duration) {
        self.api_requests_total
            .with_label_values(&[store, op, outcome])
            .inc();
        self.api_request_latency_seconds
            .with_label_values(&[store, op])
            .observe(elapsed.as_secs_f64());
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
