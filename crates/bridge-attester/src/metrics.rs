//! Prometheus metrics exported at `/metrics` (spec.md §4.5/§6.1).
//!
//! The teacher exports metrics via OpenTelemetry OTLP; spec.md §6.1 pins
//! `/metrics` to Prometheus text format, which OTLP's push pipeline doesn't
//! produce, so this module uses the `prometheus` crate instead (see
//! DESIGN.md's Open Question resolution). Structured logging stays on
//! `tracing` as the teacher does it.

use bridge_types::error::ErrorKind;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    pub messages_observed_total: IntCounter,
    pub signatures_added_total: IntCounter,
    pub errors_total: IntCounterVec,
    pub attestations_pending: IntGauge,
    pub attestations_ready: IntGauge,
    pub attestations_relayed: IntGauge,
    pub attestations_expired: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let messages_observed_total = IntCounter::new(
            "messages_observed_total",
            "ObservedMessages handed to this attester by its chain adapters",
        )
        .expect("static metric name/help is valid");
        let signatures_added_total = IntCounter::new(
            "signatures_added_total",
            "Partial signatures accepted into the attestation store",
        )
        .expect("static metric name/help is valid");
        let errors_total = IntCounterVec::new(
            Opts::new("errors_total", "Errors observed, labeled by kind and source (spec.md §7)"),
            &["kind", "source"],
        )
        .expect("static metric name/help/labels are valid");
        let attestations_pending = IntGauge::new("attestations_pending", "Attestations currently pending")
            .expect("static metric name/help is valid");
        let attestations_ready = IntGauge::new("attestations_ready", "Attestations currently ready")
            .expect("static metric name/help is valid");
        let attestations_relayed = IntGauge::new("attestations_relayed", "Attestations currently relayed")
            .expect("static metric name/help is valid");
        let attestations_expired = IntGauge::new("attestations_expired", "Attestations currently expired")
            .expect("static metric name/help is valid");

        for metric in [
            Box::new(messages_observed_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(signatures_added_total.clone()),
            Box::new(errors_total.clone()),
            Box::new(attestations_pending.clone()),
            Box::new(attestations_ready.clone()),
            Box::new(attestations_relayed.clone()),
            Box::new(attestations_expired.clone()),
        ] {
            registry
                .register(metric)
                .expect("metric names are distinct and registered exactly once");
        }

        Self {
            registry,
            messages_observed_total,
            signatures_added_total,
            errors_total,
            attestations_pending,
            attestations_ready,
            attestations_relayed,
            attestations_expired,
        }
    }

    pub fn record_error(&self, kind: ErrorKind, source: &str) {
        self.errors_total.with_label_values(&[&kind.to_string(), source]).inc();
    }

    pub fn set_attestation_counts(&self, counts: &crate::store::AttestationCounts) {
        self.attestations_pending.set(counts.pending as i64);
        self.attestations_ready.set(counts.ready as i64);
        self.attestations_relayed.set(counts.relayed as i64);
        self.attestations_expired.set(counts.expired as i64);
    }

    /// Encodes the current metric state as Prometheus text format v0.0.4.
    pub fn encode(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .expect("registered metric families always encode successfully");
        String::from_utf8(buffer).expect("the Prometheus text encoder only emits valid UTF-8")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_registered_metric_names() {
        let metrics = Metrics::new();
        metrics.messages_observed_total.inc();
        metrics.record_error(ErrorKind::Transport, "evm");
        let text = metrics.encode();
        assert!(text.contains("messages_observed_total"));
        assert!(text.contains("errors_total"));
    }
}
