//! # Prometheus Metrics
//!
//! Operational counters for the wallet service, scraped at `/metrics` on
//! the API listener. Everything lives in a dedicated registry under the
//! `cwt` namespace.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

use cwt_wallet::Currency;

/// Metric handles for the service. Cheap to clone.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Payments accepted by the chain, by currency.
    pub payments_submitted_total: IntCounterVec,
    /// Payments refused before or at submission, by currency and error code.
    pub payments_rejected_total: IntCounterVec,
    /// Ledger requests served, successful or not.
    pub ledger_requests_total: IntCounter,
    /// Requests that failed because the RPC node or price feed did.
    pub upstream_failures_total: IntCounter,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("cwt".into()), None)?;

        let payments_submitted_total = IntCounterVec::new(
            Opts::new(
                "payments_submitted_total",
                "Payments accepted by the chain",
            ),
            &["currency"],
        )?;
        registry.register(Box::new(payments_submitted_total.clone()))?;

        let payments_rejected_total = IntCounterVec::new(
            Opts::new(
                "payments_rejected_total",
                "Payments refused before or at submission",
            ),
            &["currency", "code"],
        )?;
        registry.register(Box::new(payments_rejected_total.clone()))?;

        let ledger_requests_total =
            IntCounter::new("ledger_requests_total", "Ledger requests served")?;
        registry.register(Box::new(ledger_requests_total.clone()))?;

        let upstream_failures_total = IntCounter::new(
            "upstream_failures_total",
            "Requests failed by the RPC node or the price feed",
        )?;
        registry.register(Box::new(upstream_failures_total.clone()))?;

        Ok(Self {
            registry,
            payments_submitted_total,
            payments_rejected_total,
            ledger_requests_total,
            upstream_failures_total,
        })
    }

    pub fn record_payment(&self, currency: Currency) {
        self.payments_submitted_total
            .with_label_values(&[currency.as_str()])
            .inc();
    }

    pub fn record_rejection(&self, currency: Currency, code: &str) {
        self.payments_rejected_total
            .with_label_values(&[currency.as_str(), code])
            .inc();
    }

    /// Encodes all registered metrics into the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics handle stored in the application state.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Renders the registry in Prometheus text format.
pub fn render(metrics: &NodeMetrics) -> axum::response::Response {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_namespaced_and_labelled() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.record_payment(Currency::Usdc);
        metrics.record_rejection(Currency::Sol, "COOLDOWN_ACTIVE");
        metrics.ledger_requests_total.inc();

        let text = metrics.encode().unwrap();
        assert!(text.contains("cwt_payments_submitted_total{currency=\"USDC\"} 1"));
        assert!(text.contains("code=\"COOLDOWN_ACTIVE\""));
        assert!(text.contains("cwt_ledger_requests_total 1"));
    }
}
