//! Attestation Store: single-writer-per-process map from `MessageId ->
//! Attestation` (spec.md §4.4). All mutations serialize through one
//! `tokio::sync::Mutex`-guarded region; reads return cloned snapshots, per
//! spec.md §5's "Shared resources" rule that no mutation may span a
//! suspension point.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use bridge_types::attestation::{Attestation, AttestationStatus, ObservedStatus, PartialSignature};
use bridge_types::domain::Domain;
use bridge_types::message::MessageId;
use tokio::sync::Mutex;

/// Current wall-clock time in milliseconds since the Unix epoch, the same
/// `SystemTime`/`UNIX_EPOCH` pattern the teacher uses in `timestamp.rs`.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as u64
}

/// Outcome of `add_signature` (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddResult {
    Accepted,
    DuplicateAttester,
    NotFound,
    Expired,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("message_id {message_id} was previously stored with different message_bytes")]
    MessageBytesMismatch { message_id: MessageId },
}

/// Snapshot of how many attestations are in each externally-visible status
/// (spec.md §4.5 `/health`, `/stats`).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct AttestationCounts {
    pub pending: usize,
    pub ready: usize,
    pub relayed: usize,
    pub expired: usize,
}

struct Inner {
    by_id: HashMap<MessageId, Attestation>,
    by_nonce: HashMap<(Domain, u64), MessageId>,
}

pub struct AttestationStore {
    inner: Mutex<Inner>,
    threshold: usize,
    ttl_ms: u64,
}

impl AttestationStore {
    pub fn new(threshold: usize) -> Self {
        Self::with_ttl(threshold, Attestation::DEFAULT_TTL_MS)
    }

    pub fn with_ttl(threshold: usize, ttl_ms: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                by_id: HashMap::new(),
                by_nonce: HashMap::new(),
            }),
            threshold,
            ttl_ms,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Creates the attestation if absent; returns the existing one
    /// unchanged if already present with identical `message_bytes` (spec.md
    /// §8 property 5: `ensure` is idempotent). Fails loudly on a bytes
    /// mismatch rather than silently reconciling, since that can only
    /// happen if canonicalization disagreed with itself.
    pub async fn ensure(
        &self,
        message_id: MessageId,
        message_bytes: Vec<u8>,
        source_domain: Domain,
        destination_domain: Domain,
        nonce: u64,
    ) -> Result<Attestation, StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.by_id.get(&message_id) {
            if existing.message_bytes != message_bytes {
                return Err(StoreError::MessageBytesMismatch { message_id });
            }
            return Ok(existing.clone());
        }
        let created_at_ms = now_ms();
        let attestation = Attestation {
            message_id,
            message_bytes,
            source_domain,
            destination_domain,
            nonce,
            signatures: Vec::new(),
            status: AttestationStatus::Pending,
            created_at_ms,
            expires_at_ms: created_at_ms + self.ttl_ms,
        };
        inner.by_id.insert(message_id, attestation.clone());
        inner.by_nonce.insert((source_domain, nonce), message_id);
        Ok(attestation)
    }

    /// Adds one attester's signature, transitioning `pending -> ready`
    /// atomically the moment the stored signature count crosses
    /// `threshold` (spec.md §4.4, §8 property 1).
    pub async fn add_signature(&self, message_id: MessageId, signature: PartialSignature) -> AddResult {
        let mut inner = self.inner.lock().await;
        let now = now_ms();
        let Some(attestation) = inner.by_id.get_mut(&message_id) else {
            return AddResult::NotFound;
        };
        if now >= attestation.expires_at_ms && attestation.status != AttestationStatus::Relayed {
            return AddResult::Expired;
        }
        if attestation
            .signatures
            .iter()
            .any(|s| s.attester_id == signature.attester_id)
        {
            return AddResult::DuplicateAttester;
        }
        attestation.signatures.push(signature);
        if attestation.status == AttestationStatus::Pending && attestation.signatures.len() >= self.threshold {
            attestation.status = AttestationStatus::Ready;
        }
        AddResult::Accepted
    }

    pub async fn get(&self, message_id: MessageId) -> Option<Attestation> {
        self.inner.lock().await.by_id.get(&message_id).cloned()
    }

    pub async fn get_by_nonce(&self, source_domain: Domain, nonce: u64) -> Option<Attestation> {
        let inner = self.inner.lock().await;
        let message_id = inner.by_nonce.get(&(source_domain, nonce))?;
        inner.by_id.get(message_id).cloned()
    }

    /// Snapshot of every attestation currently `ready` (spec.md §4.4).
    pub async fn list_ready(&self) -> Vec<Attestation> {
        self.inner
            .lock()
            .await
            .by_id
            .values()
            .filter(|a| a.status == AttestationStatus::Ready)
            .cloned()
            .collect()
    }

    /// Idempotent `ready -> relayed` transition (spec.md §8 property 7):
    /// calling this twice, or on an unknown `message_id`, has no additional
    /// effect beyond the first call.
    pub async fn mark_relayed(&self, message_id: MessageId) {
        let mut inner = self.inner.lock().await;
        if let Some(attestation) = inner.by_id.get_mut(&message_id) {
            attestation.status = AttestationStatus::Relayed;
        }
    }

    /// Removes exactly the entries with `now_ms >= expires_at_ms` and no
    /// others (spec.md §8 property 10), returning how many were removed.
    pub async fn sweep(&self, now_ms: u64) -> usize {
        let mut inner = self.inner.lock().await;
        let expired: Vec<MessageId> = inner
            .by_id
            .iter()
            .filter(|(_, a)| now_ms >= a.expires_at_ms)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            if let Some(a) = inner.by_id.remove(id) {
                inner.by_nonce.remove(&(a.source_domain, a.nonce));
            }
        }
        expired.len()
    }

    pub async fn counts(&self, now_ms: u64) -> AttestationCounts {
        let inner = self.inner.lock().await;
        let mut counts = AttestationCounts::default();
        for attestation in inner.by_id.values() {
            match attestation.status_at(now_ms) {
                ObservedStatus::Pending => counts.pending += 1,
                ObservedStatus::Ready => counts.ready += 1,
                ObservedStatus::Relayed => counts.relayed += 1,
                ObservedStatus::Expired => counts.expired += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_types::attestation::SignatureScheme;

    fn sig(attester_id: u8) -> PartialSignature {
        PartialSignature {
            attester_id,
            scheme: SignatureScheme::EcdsaSecp256k1,
            signature: vec![0u8; 65],
            signed_at_ms: 0,
        }
    }

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let store = AttestationStore::new(2);
        let id = MessageId([1; 32]);
        let bytes = vec![7u8; 128];
        let a = store
            .ensure(id, bytes.clone(), Domain::EVM_ETHEREUM, Domain::SUBSTRATE, 5)
            .await
            .unwrap();
        let b = store
            .ensure(id, bytes, Domain::EVM_ETHEREUM, Domain::SUBSTRATE, 5)
            .await
            .unwrap();
        assert_eq!(a.signatures.len(), b.signatures.len());
        assert_eq!(a.created_at_ms, b.created_at_ms);
    }

    #[tokio::test]
    async fn ensure_rejects_bytes_mismatch() {
        let store = AttestationStore::new(2);
        let id = MessageId([2; 32]);
        store
            .ensure(id, vec![1u8; 128], Domain::EVM_ETHEREUM, Domain::SUBSTRATE, 1)
            .await
            .unwrap();
        let err = store
            .ensure(id, vec![2u8; 128], Domain::EVM_ETHEREUM, Domain::SUBSTRATE, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MessageBytesMismatch { .. }));
    }

    #[tokio::test]
    async fn threshold_crossing_transitions_to_ready() {
        let store = AttestationStore::new(2);
        let id = MessageId([3; 32]);
        store
            .ensure(id, vec![0u8; 128], Domain::EVM_ETHEREUM, Domain::SUBSTRATE, 1)
            .await
            .unwrap();
        assert_eq!(store.add_signature(id, sig(1)).await, AddResult::Accepted);
        assert!(store.list_ready().await.is_empty());
        assert_eq!(store.add_signature(id, sig(2)).await, AddResult::Accepted);
        assert_eq!(store.list_ready().await.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_attester_id_is_rejected() {
        let store = AttestationStore::new(2);
        let id = MessageId([4; 32]);
        store
            .ensure(id, vec![0u8; 128], Domain::EVM_ETHEREUM, Domain::SUBSTRATE, 1)
            .await
            .unwrap();
        assert_eq!(store.add_signature(id, sig(1)).await, AddResult::Accepted);
        assert_eq!(store.add_signature(id, sig(1)).await, AddResult::DuplicateAttester);
    }

    #[tokio::test]
    async fn add_signature_on_unknown_message_is_not_found() {
        let store = AttestationStore::new(2);
        assert_eq!(
            store.add_signature(MessageId([9; 32]), sig(1)).await,
            AddResult::NotFound
        );
    }

    #[tokio::test]
    async fn mark_relayed_is_idempotent() {
        let store = AttestationStore::new(1);
        let id = MessageId([5; 32]);
        store
            .ensure(id, vec![0u8; 128], Domain::EVM_ETHEREUM, Domain::SUBSTRATE, 1)
            .await
            .unwrap();
        store.add_signature(id, sig(1)).await;
        store.mark_relayed(id).await;
        let first = store.get(id).await.unwrap();
        store.mark_relayed(id).await;
        let second = store.get(id).await.unwrap();
        assert_eq!(first.status, AttestationStatus::Relayed);
        assert_eq!(second.status, AttestationStatus::Relayed);
    }

    #[tokio::test]
    async fn sweep_removes_exactly_the_expired_entries() {
        let store = AttestationStore::with_ttl(1, 1_000);
        let expiring = MessageId([6; 32]);
        let fresh = MessageId([7; 32]);
        store
            .ensure(expiring, vec![0u8; 128], Domain::EVM_ETHEREUM, Domain::SUBSTRATE, 1)
            .await
            .unwrap();
        let removed = store.sweep(now_ms() + 2_000).await;
        assert_eq!(removed, 1);
        assert!(store.get(expiring).await.is_none());

        store
            .ensure(fresh, vec![0u8; 128], Domain::EVM_ETHEREUM, Domain::SUBSTRATE, 2)
            .await
            .unwrap();
        let removed = store.sweep(now_ms()).await;
        assert_eq!(removed, 0);
        assert!(store.get(fresh).await.is_some());
    }
}
