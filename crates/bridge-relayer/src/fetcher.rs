//! Attestation Fetcher (spec.md §4.6): polls a configured list of Attester
//! Service base URLs, deduplicates by `MessageId`, and emits
//! [`ReadyAttestation`] values that have already crossed threshold.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bridge_types::attestation::{PartialSignature, ReadyAttestation, SignatureScheme};
use bridge_types::domain::Domain;
use bridge_types::message::MessageId;
use serde::Deserialize;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::metrics::RelayerMetrics;

/// Wire shape of one entry in `GET /attestations/ready`'s `attestations`
/// array, matching `bridge_attester::handlers::AttestationView` (spec.md
/// §6.1). Not `ReadyAttestation` itself: the HTTP API is a projection with
/// hex-encoded strings and camelCase field names.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttestationViewWire {
    message_hash: String,
    message: String,
    signatures: Vec<SignatureViewWire>,
    #[allow(dead_code)]
    signature_count: usize,
    #[allow(dead_code)]
    threshold_met: bool,
    status: String,
    source_domain: u32,
    destination_domain: u32,
    nonce: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureViewWire {
    attester_id: u8,
    scheme: String,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct ReadyListResponse {
    attestations: Vec<AttestationViewWire>,
}

#[derive(Debug, thiserror::Error)]
pub enum WireDecodeError {
    #[error("malformed message_id: {0}")]
    MessageId(hex::FromHexError),
    #[error("malformed message bytes: {0}")]
    MessageBytes(hex::FromHexError),
    #[error("malformed signature bytes: {0}")]
    Signature(hex::FromHexError),
    #[error("unknown signature scheme {0:?}")]
    UnknownScheme(String),
}

impl AttestationViewWire {
    fn into_ready(self) -> Result<(ReadyAttestation, u64), WireDecodeError> {
        let message_id = MessageId::from_hex(&self.message_hash).map_err(WireDecodeError::MessageId)?;
        let raw = self.message.strip_prefix("0x").unwrap_or(&self.message);
        let message_bytes = hex::decode(raw).map_err(WireDecodeError::MessageBytes)?;
        let mut signatures_ordered = Vec::with_capacity(self.signatures.len());
        for sig in self.signatures {
            let scheme = match sig.scheme.as_str() {
                "EcdsaSecp256k1" => SignatureScheme::EcdsaSecp256k1,
                "Sr25519" => SignatureScheme::Sr25519,
                other => return Err(WireDecodeError::UnknownScheme(other.to_string())),
            };
            let raw_sig = sig.signature.strip_prefix("0x").unwrap_or(&sig.signature);
            let signature = hex::decode(raw_sig).map_err(WireDecodeError::Signature)?;
            signatures_ordered.push(PartialSignature {
                attester_id: sig.attester_id,
                scheme,
                signature,
                signed_at_ms: 0,
            });
        }
        signatures_ordered.sort_by_key(|s| s.attester_id);
        Ok((
            ReadyAttestation {
                message_id,
                message_bytes,
                signatures_ordered,
                destination_domain: Domain(self.destination_domain),
            },
            self.nonce,
        ))
    }
}

/// Per-source polling health (spec.md §4.6: "Health of each source is
/// tracked independently").
#[derive(Debug, Clone, Default)]
pub struct SourceHealth {
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_success_ms: Option<u64>,
}

struct DedupeSet {
    order: VecDeque<MessageId>,
    seen: HashSet<MessageId>,
    capacity: usize,
}

impl DedupeSet {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity.min(1024)),
            seen: HashSet::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Returns `true` if `id` had not been seen before, recording it.
    /// Evicts the oldest entry once `capacity` is exceeded (spec.md §4.6:
    /// "capacity default 10 000; oldest entries dropped").
    fn insert(&mut self, id: MessageId) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }
}

/// Polls `sources` for newly-ready attestations on a fixed interval,
/// deduplicating across polls and across sources (spec.md §4.6).
pub struct AttestationFetcher {
    client: reqwest::Client,
    sources: Vec<Url>,
    dedupe: Mutex<DedupeSet>,
    health: Mutex<Vec<SourceHealth>>,
    poll_interval: Duration,
    metrics: Arc<RelayerMetrics>,
}

impl AttestationFetcher {
    pub fn new(
        sources: Vec<Url>,
        poll_interval: Duration,
        request_timeout: Duration,
        dedupe_capacity: usize,
        metrics: Arc<RelayerMetrics>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("reqwest client with a fixed timeout always builds");
        let health = (0..sources.len()).map(|_| SourceHealth::default()).collect();
        Self {
            client,
            sources,
            dedupe: Mutex::new(DedupeSet::new(dedupe_capacity)),
            health: Mutex::new(health),
            poll_interval,
            metrics,
        }
    }

    pub async fn health_snapshot(&self) -> Vec<(Url, SourceHealth)> {
        let health = self.health.lock().await;
        self.sources.iter().cloned().zip(health.iter().cloned()).collect()
    }

    /// Runs the poll loop until `cancellation` fires, sending newly-seen
    /// ready attestations on `tx`. A full `tx` (bounded channel) applies
    /// backpressure by pausing the next poll tick (spec.md §5).
    pub async fn run(&self, tx: mpsc::Sender<ReadyAttestation>, cancellation: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = ticker.tick() => {
                    self.poll_once(&tx).await;
                }
            }
        }
    }

    async fn poll_once(&self, tx: &mpsc::Sender<ReadyAttestation>) {
        for (index, source) in self.sources.iter().enumerate() {
            match self.fetch_ready(source).await {
                Ok(entries) => {
                    self.record_success(index).await;
                    for entry in entries {
                        let (ready, _nonce) = match entry.into_ready() {
                            Ok(parsed) => parsed,
                            Err(e) => {
                                warn!(source = %source, error = %e, "skipping malformed ready attestation");
                                continue;
                            }
                        };
                        let is_new = {
                            let mut dedupe = self.dedupe.lock().await;
                            dedupe.insert(ready.message_id)
                        };
                        if is_new {
                            self.metrics.attestations_fetched_total.inc();
                            debug!(message_id = %ready.message_id, source = %source, "new ready attestation");
                            if tx.send(ready).await.is_err() {
                                return;
                            }
                        } else {
                            self.metrics.dedupe_duplicates_total.inc();
                        }
                    }
                }
                Err(e) => {
                    self.record_failure(index, e.to_string()).await;
                    self.metrics.record_fetch_error(&source.to_string());
                }
            }
        }
    }

    async fn fetch_ready(&self, source: &Url) -> Result<Vec<AttestationViewWire>, reqwest::Error> {
        let url = source.join("/attestations/ready").expect("source is a valid base URL");
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body: ReadyListResponse = response.json().await?;
        Ok(body.attestations)
    }

    async fn record_success(&self, index: usize) {
        let mut health = self.health.lock().await;
        if let Some(entry) = health.get_mut(index) {
            entry.consecutive_failures = 0;
            entry.last_error = None;
            entry.last_success_ms = Some(crate::metrics::now_ms());
        }
    }

    async fn record_failure(&self, index: usize, error: String) {
        let mut health = self.health.lock().await;
        if let Some(entry) = health.get_mut(index) {
            entry.consecutive_failures += 1;
            entry.last_error = Some(error);
        }
    }

    /// Synchronous lookup by `message_id`, trying each configured source
    /// until one returns `200` (spec.md §4.6).
    pub async fn by_hash(&self, message_id: MessageId) -> Option<ReadyAttestation> {
        for source in &self.sources {
            let url = source
                .join(&format!("/attestation/{}", message_id.to_hex()))
                .ok()?;
            if let Ok(response) = self.client.get(url).send().await {
                if response.status().is_success() {
                    if let Ok(view) = response.json::<AttestationViewWire>().await {
                        if let Ok((ready, _)) = view.into_ready() {
                            return Some(ready);
                        }
                    }
                }
            }
        }
        None
    }

    /// Synchronous lookup by `(source_domain, nonce)`, trying each
    /// configured source until one returns `200` (spec.md §4.6).
    pub async fn by_nonce(&self, source_domain: Domain, nonce: u64) -> Option<ReadyAttestation> {
        for source in &self.sources {
            let url = source.join(&format!("/attestation/{}/{}", source_domain.0, nonce)).ok()?;
            if let Ok(response) = self.client.get(url).send().await {
                if response.status().is_success() {
                    if let Ok(view) = response.json::<AttestationViewWire>().await {
                        if let Ok((ready, _)) = view.into_ready() {
                            return Some(ready);
                        }
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(id: u8, status: &str) -> AttestationViewWire {
        AttestationViewWire {
            message_hash: format!("0x{}", hex::encode([id; 32])),
            message: format!("0x{}", hex::encode([0u8; 128])),
            signatures: vec![SignatureViewWire {
                attester_id: 1,
                scheme: "EcdsaSecp256k1".to_string(),
                signature: format!("0x{}", hex::encode([0u8; 65])),
            }],
            signature_count: 1,
            threshold_met: true,
            status: status.to_string(),
            source_domain: 0,
            destination_domain: 2,
            nonce: 7,
        }
    }

    #[test]
    fn dedupe_set_rejects_repeats_and_evicts_oldest() {
        let mut set = DedupeSet::new(2);
        let a = MessageId([1; 32]);
        let b = MessageId([2; 32]);
        let c = MessageId([3; 32]);
        assert!(set.insert(a));
        assert!(!set.insert(a));
        assert!(set.insert(b));
        assert!(set.insert(c));
        // capacity 2: inserting c evicts a, so a can be seen again.
        assert!(set.insert(a));
    }

    #[test]
    fn wire_decodes_into_ready_attestation() {
        let (ready, nonce) = wire(9, "ready").into_ready().unwrap();
        assert_eq!(ready.destination_domain, Domain::SUBSTRATE);
        assert_eq!(nonce, 7);
        assert_eq!(ready.signatures_ordered.len(), 1);
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let mut w = wire(1, "ready");
        w.signatures[0].scheme = "bogus".to_string();
        assert!(matches!(w.into_ready(), Err(WireDecodeError::UnknownScheme(_))));
    }
}
