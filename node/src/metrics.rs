//! Prometheus metrics for the validator.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`]; the `/metrics` endpoint
//! encodes it in the Prometheus text exposition format.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter,
    IntGauge, Opts, Registry, TextEncoder,
};

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Requests, relays and code matches that succeeded.
    pub request_success: IntCounter,
    /// Requests that failed on storage, the ledger, or an unknown id.
    pub request_failure: IntCounter,
    /// Driver-loop firings skipped because the previous tick was still running.
    pub ticks_skipped: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Incremented on every scrape.
    pub status: IntGauge,
    /// Peers tracked from the on-chain validator set.
    pub peer_count: IntGauge,
}

impl NodeMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let request_success = register_int_counter_with_registry!(
            Opts::new("phonelink_request_success_total", "Requests that succeeded"),
            registry
        )
        .expect("failed to register request_success counter");

        let request_failure = register_int_counter_with_registry!(
            Opts::new("phonelink_request_failure_total", "Requests that failed"),
            registry
        )
        .expect("failed to register request_failure counter");

        let ticks_skipped = register_int_counter_with_registry!(
            Opts::new(
                "phonelink_ticks_skipped_total",
                "Driver ticks skipped while the previous tick was running"
            ),
            registry
        )
        .expect("failed to register ticks_skipped counter");

        let status = register_int_gauge_with_registry!(
            Opts::new("phonelink_status", "Serve status"),
            registry
        )
        .expect("failed to register status gauge");

        let peer_count = register_int_gauge_with_registry!(
            Opts::new("phonelink_peer_count", "Tracked peer validators"),
            registry
        )
        .expect("failed to register peer_count gauge");

        Self {
            registry,
            request_success,
            request_failure,
            ticks_skipped,
            status,
            peer_count,
        }
    }

    /// Text exposition of every registered metric.
    pub fn encode(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!("failed to encode metrics: {e}");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}
