//! Prometheus metrics for the faucet service

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

lazy_static! {
    pub static ref CLAIMS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("ande_faucet_claims_total", "Claim requests by outcome"),
        &["status"] // success | rejected | failed
    )
    .unwrap();
    pub static ref REJECTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            "ande_faucet_rejections_total",
            "Claims not dispensed, by error code"
        ),
        &["reason"]
    )
    .unwrap();
    pub static ref DISPENSED_WEI_TOTAL: Counter = Counter::new(
        "ande_faucet_dispensed_wei_total",
        "Total wei dispensed by confirmed claims"
    )
    .unwrap();
    pub static ref DISPATCH_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "ande_faucet_dispatch_duration_seconds",
            "Submit-to-confirmation duration in seconds"
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 15.0, 45.0])
    )
    .unwrap();
    pub static ref BALANCE_WEI: Gauge = Gauge::new(
        "ande_faucet_balance_wei",
        "Hot wallet balance at last observation"
    )
    .unwrap();
}

/// Metrics registry handle
#[derive(Clone)]
pub struct FaucetMetrics {
    registry: Arc<Registry>,
}

impl FaucetMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        registry.register(Box::new(CLAIMS_TOTAL.clone())).unwrap();
        registry
            .register(Box::new(REJECTIONS_TOTAL.clone()))
            .unwrap();
        registry
            .register(Box::new(DISPENSED_WEI_TOTAL.clone()))
            .unwrap();
        registry
            .register(Box::new(DISPATCH_DURATION.clone()))
            .unwrap();
        registry.register(Box::new(BALANCE_WEI.clone())).unwrap();

        Self {
            registry: Arc::new(registry),
        }
    }

    /// Render all registered metrics in Prometheus text format.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn record_success(&self, amount_wei: u128) {
        CLAIMS_TOTAL.with_label_values(&["success"]).inc();
        DISPENSED_WEI_TOTAL.inc_by(amount_wei as f64);
    }

    pub fn record_rejection(&self, reason: &str) {
        CLAIMS_TOTAL.with_label_values(&["rejected"]).inc();
        REJECTIONS_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn record_dispatch_failure(&self, reason: &str) {
        CLAIMS_TOTAL.with_label_values(&["failed"]).inc();
        REJECTIONS_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn observe_dispatch(&self, seconds: f64) {
        DISPATCH_DURATION.observe(seconds);
    }

    pub fn set_balance(&self, wei: u128) {
        BALANCE_WEI.set(wei as f64);
    }
}

impl Default for FaucetMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_renders_registered_metrics() {
        let metrics = FaucetMetrics::new();
        metrics.record_success(100);
        metrics.record_rejection("RATE_LIMITED");

        let text = metrics.gather().unwrap();
        assert!(text.contains("ande_faucet_claims_total"));
        assert!(text.contains("ande_faucet_rejections_total"));
    }
}
