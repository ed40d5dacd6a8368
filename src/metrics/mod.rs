//! Metrics module for Prometheus
//!
//! This module provides metrics collection for the gateway service:
//! - Request count by method, route, and status
//! - Request latency histogram
//! - Upstream (Kraken) call outcomes per endpoint

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Route label used for requests that matched no route
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Gateway metrics collector
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    request_counter: CounterVec,
    request_latency: HistogramVec,
    upstream_counter: CounterVec,
}

impl GatewayMetrics {
    /// Create a new metrics instance
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let request_counter = CounterVec::new(
            Opts::new("gateway_requests_total", "Total number of requests"),
            &["method", "path", "status"],
        )?;

        let request_latency = HistogramVec::new(
            HistogramOpts::new(
                "gateway_request_latency_seconds",
                "Request latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "path"],
        )?;

        let upstream_counter = CounterVec::new(
            Opts::new(
                "gateway_upstream_calls_total",
                "Total number of Kraken API calls by endpoint and outcome",
            ),
            &["endpoint", "outcome"],
        )?;

        registry.register(Box::new(request_counter.clone()))?;
        registry.register(Box::new(request_latency.clone()))?;
        registry.register(Box::new(upstream_counter.clone()))?;

        Ok(Self {
            registry,
            request_counter,
            request_latency,
            upstream_counter,
        })
    }

    /// Record a request with its status and latency
    pub fn record_request(&self, method: &str, route: &str, status: u16, latency: Duration) {
        let status_str = status.to_string();

        self.request_counter
            .with_label_values(&[method, route, &status_str])
            .inc();

        self.request_latency
            .with_label_values(&[method, route])
            .observe(latency.as_secs_f64());
    }

    /// Record the outcome of a delegated Kraken call
    pub fn record_upstream_call(&self, endpoint: &str, success: bool) {
        let outcome = if success { "ok" } else { "error" };
        self.upstream_counter
            .with_label_values(&[endpoint, outcome])
            .inc();
    }

    /// Get the Prometheus metrics output
    pub fn prometheus_output(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
