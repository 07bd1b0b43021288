//! Prometheus metrics exported by the relayer binary's `/metrics`
//! (spec.md §4.5's `/metrics` contract, reused here since component H is
//! cross-cutting and spec.md §6.1 fixes the wire format regardless of
//! which process exposes it).

use std::time::{SystemTime, UNIX_EPOCH};

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as u64
}

pub struct RelayerMetrics {
    registry: Registry,
    pub attestations_fetched_total: IntCounter,
    pub dedupe_duplicates_total: IntCounter,
    pub fetch_errors_total: IntCounterVec,
    pub submissions_confirmed_total: IntCounter,
    pub submissions_rejected_total: IntCounter,
    pub submissions_failed_total: IntCounter,
    pub in_flight_submissions: IntGauge,
}

impl RelayerMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let attestations_fetched_total = IntCounter::new(
            "attestations_fetched_total",
            "Newly-seen ReadyAttestations emitted by the fetcher",
        )
        .expect("static metric name/help is valid");
        let dedupe_duplicates_total = IntCounter::new(
            "dedupe_duplicates_total",
            "Ready attestations dropped as already-seen duplicates",
        )
        .expect("static metric name/help is valid");
        let fetch_errors_total = IntCounterVec::new(
            Opts::new("fetch_errors_total", "Per-source polling failures"),
            &["source"],
        )
        .expect("static metric name/help/labels are valid");
        let submissions_confirmed_total = IntCounter::new(
            "submissions_confirmed_total",
            "Destination submissions that reached Confirmed",
        )
        .expect("static metric name/help is valid");
        let submissions_rejected_total = IntCounter::new(
            "submissions_rejected_total",
            "Destination submissions terminally Rejected (e.g. already relayed)",
        )
        .expect("static metric name/help is valid");
        let submissions_failed_total = IntCounter::new(
            "submissions_failed_total",
            "Destination submissions that exhausted their retry budget",
        )
        .expect("static metric name/help is valid");
        let in_flight_submissions = IntGauge::new(
            "in_flight_submissions",
            "Submissions currently in flight (at most one per message_id)",
        )
        .expect("static metric name/help is valid");

        for metric in [
            Box::new(attestations_fetched_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(dedupe_duplicates_total.clone()),
            Box::new(fetch_errors_total.clone()),
            Box::new(submissions_confirmed_total.clone()),
            Box::new(submissions_rejected_total.clone()),
            Box::new(submissions_failed_total.clone()),
            Box::new(in_flight_submissions.clone()),
        ] {
            registry
                .register(metric)
                .expect("metric names are distinct and registered exactly once");
        }

        Self {
            registry,
            attestations_fetched_total,
            dedupe_duplicates_total,
            fetch_errors_total,
            submissions_confirmed_total,
            submissions_rejected_total,
            submissions_failed_total,
            in_flight_submissions,
        }
    }

    pub fn record_fetch_error(&self, source: &str) {
        self.fetch_errors_total.with_label_values(&[source]).inc();
    }

    pub fn encode(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .expect("registered metric families always encode successfully");
        String::from_utf8(buffer).expect("the Prometheus text encoder only emits valid UTF-8")
    }
}

impl Default for RelayerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_registered_metric_names() {
        let metrics = RelayerMetrics::new();
        metrics.attestations_fetched_total.inc();
        metrics.record_fetch_error("attester-1");
        let text = metrics.encode();
        assert!(text.contains("attestations_fetched_total"));
        assert!(text.contains("fetch_errors_total"));
    }
}
