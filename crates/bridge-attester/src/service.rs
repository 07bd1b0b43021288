//! Attester Service (spec.md §4.5): binds one `AttesterIdentity`, one
//! `Signer`, one `AttestationStore`, and one or more Chain Adapters, and
//! drives the adapter -> canonicalize -> ensure -> sign -> add_signature
//! pipeline plus the periodic sweep.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bridge_types::adapter::{Adapter, AdapterStatus};
use bridge_types::attestation::AttesterIdentity;
use bridge_types::error::ErrorKind;
use bridge_types::message::{ObservedMessage, canonicalize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::signer::Signer;
use crate::store::{AddResult, AttestationCounts, AttestationStore, now_ms};
use crate::metrics::Metrics;

/// Object-safe façade over [`Adapter`], erasing its associated `Error` type
/// to a `String` so adapters of different chain families can be held in
/// one `Vec` and supervised uniformly (spec.md §4.5 binds "one or more
/// Chain Adapters" without naming their concrete types).
#[async_trait]
pub trait DynAdapter: Send + Sync {
    async fn start(&self) -> Result<mpsc::Receiver<ObservedMessage>, String>;
    async fn stop(&self);
    async fn status(&self) -> AdapterStatus;
}

struct AdapterBridge<A: Adapter> {
    inner: A,
}

#[async_trait]
impl<A: Adapter> DynAdapter for AdapterBridge<A> {
    async fn start(&self) -> Result<mpsc::Receiver<ObservedMessage>, String> {
        self.inner.start().await.map_err(|e| e.to_string())
    }

    async fn stop(&self) {
        self.inner.stop().await;
    }

    async fn status(&self) -> AdapterStatus {
        self.inner.status().await
    }
}

/// Wraps a concrete `Adapter` impl for storage alongside adapters of other
/// chain families.
pub fn erase_adapter<A: Adapter + 'static>(adapter: A) -> Arc<dyn DynAdapter> {
    Arc::new(AdapterBridge { inner: adapter })
}

#[derive(serde::Serialize)]
pub struct HealthSnapshot {
    pub status: String,
    pub uptime_ms: u64,
    pub adapters: HashMap<String, AdapterStatus>,
    pub attestations: AttestationCounts,
}

pub struct AttesterService {
    identity: AttesterIdentity,
    signer: Signer,
    store: Arc<AttestationStore>,
    metrics: Arc<Metrics>,
    adapters: Vec<(String, Arc<dyn DynAdapter>)>,
    started_at_ms: u64,
    cancellation: CancellationToken,
    sweep_interval_ms: u64,
}

impl AttesterService {
    pub fn new(
        identity: AttesterIdentity,
        signer: Signer,
        store: Arc<AttestationStore>,
        metrics: Arc<Metrics>,
        adapters: Vec<(String, Arc<dyn DynAdapter>)>,
        sweep_interval_ms: u64,
    ) -> Arc<Self> {
        Arc::new(Self {
            identity,
            signer,
            store,
            metrics,
            adapters,
            started_at_ms: now_ms(),
            cancellation: CancellationToken::new(),
            sweep_interval_ms,
        })
    }

    pub fn identity(&self) -> AttesterIdentity {
        self.identity
    }

    pub fn store(&self) -> &Arc<AttestationStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Starts every configured adapter and spawns the background consumer
    /// and sweep tasks. Returns once all adapters have started; the
    /// spawned tasks keep running until `stop` is called or the
    /// cancellation token fires.
    pub async fn run(self: &Arc<Self>) -> Result<(), String> {
        for (name, adapter) in &self.adapters {
            let rx = adapter.start().await.map_err(|e| format!("adapter {name} failed to start: {e}"))?;
            let this = Arc::clone(self);
            let name = name.clone();
            let cancellation = self.cancellation.clone();
            tokio::spawn(async move {
                this.consume(name, rx, cancellation).await;
            });
        }

        let this = Arc::clone(self);
        let cancellation = self.cancellation.clone();
        tokio::spawn(async move {
            this.sweep_loop(cancellation).await;
        });

        Ok(())
    }

    async fn consume(&self, adapter_name: String, mut rx: mpsc::Receiver<ObservedMessage>, cancellation: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                message = rx.recv() => {
                    match message {
                        Some(message) => self.handle_message(&adapter_name, message).await,
                        None => break,
                    }
                }
            }
        }
    }

    /// The per-message pipeline spec.md §4.5 describes: canonicalize,
    /// `ensure` in the store, sign, `add_signature` with this attester's
    /// own identity.
    async fn handle_message(&self, adapter_name: &str, message: ObservedMessage) {
        self.metrics.messages_observed_total.inc();

        let (message_bytes, message_id) = match canonicalize(&message) {
            Ok(out) => out,
            Err(e) => {
                warn!(adapter = adapter_name, error = %e, "message failed canonicalization, skipping");
                self.metrics.record_error(ErrorKind::ChainProtocol, adapter_name);
                return;
            }
        };

        if let Err(e) = self
            .store
            .ensure(
                message_id,
                message_bytes,
                message.source_domain,
                message.destination_domain,
                message.nonce,
            )
            .await
        {
            error!(adapter = adapter_name, error = %e, %message_id, "canonicalization mismatch between sightings, alarming");
            self.metrics.record_error(ErrorKind::Canonicalization, adapter_name);
            return;
        }

        let signature = match self.signer.sign(message_id, message.destination_domain, now_ms()) {
            Ok(signature) => signature,
            Err(e) => {
                error!(error = %e, %message_id, "signing failed; this attester cannot continue safely");
                self.metrics.record_error(ErrorKind::Signing, adapter_name);
                // spec.md §7: a Signing error is fatal to the attester process.
                std::process::exit(2);
            }
        };

        match self.store.add_signature(message_id, signature).await {
            AddResult::Accepted => {
                self.metrics.signatures_added_total.inc();
                info!(%message_id, attester_id = self.identity.id, "signed and recorded attestation");
            }
            AddResult::DuplicateAttester => {
                info!(%message_id, "signature for this attester_id already recorded");
                self.metrics.record_error(ErrorKind::Duplicate, adapter_name);
            }
            AddResult::NotFound => {
                error!(%message_id, "ensure succeeded but add_signature reports not_found; this is a bug");
            }
            AddResult::Expired => {
                info!(%message_id, "attestation already expired, dropping signature");
            }
        }
    }

    async fn sweep_loop(&self, cancellation: CancellationToken) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(self.sweep_interval_ms));
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = self.store.sweep(now_ms()).await;
                    if removed > 0 {
                        info!(removed, "swept expired attestations");
                    }
                    let counts = self.store.counts(now_ms()).await;
                    self.metrics.set_attestation_counts(&counts);
                }
            }
        }
    }

    /// Graceful shutdown (spec.md §4.5/§5): cancels background tasks and
    /// stops every adapter. Does not wait for in-flight signing to drain
    /// beyond the grace period the caller enforces around this call.
    pub async fn stop(&self) {
        self.cancellation.cancel();
        for (_, adapter) in &self.adapters {
            adapter.stop().await;
        }
    }

    pub async fn health_snapshot(&self) -> HealthSnapshot {
        let mut adapters = HashMap::new();
        let mut any_running = false;
        let mut all_running = true;
        for (name, adapter) in &self.adapters {
            let status = adapter.status().await;
            any_running = any_running || status.running;
            all_running = all_running && status.running;
            adapters.insert(name.clone(), status);
        }
        let status = if self.adapters.is_empty() {
            "unhealthy"
        } else if all_running {
            "healthy"
        } else if any_running {
            "degraded"
        } else {
            "unhealthy"
        };
        HealthSnapshot {
            status: status.to_string(),
            uptime_ms: now_ms().saturating_sub(self.started_at_ms),
            adapters,
            attestations: self.store.counts(now_ms()).await,
        }
    }
}
