//! Attestation-side data model: identities, partial signatures, and the
//! attestation record itself (spec.md §3, components C/D).

use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::message::MessageId;

/// `(id, ecdsa_address, sr25519_public)` — one attester's stable identity.
///
/// `id` is a small integer assigned at provisioning; it is never reused or
/// renumbered across the fleet's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttesterIdentity {
    pub id: u8,
    pub ecdsa_address: [u8; 20],
    pub sr25519_public: [u8; 32],
}

/// Which signature scheme a [`PartialSignature`] was produced with.
///
/// Dictated entirely by the message's `destination_domain` (spec.md §4.3):
/// an attester never chooses a scheme independently of the message it is
/// signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureScheme {
    /// secp256k1 ECDSA over the Ethereum-signed-message prefix of the
    /// `MessageId`; 65-byte `(r, s, v)`.
    EcdsaSecp256k1,
    /// Sr25519 over the `MessageId` directly; 64-byte signature.
    Sr25519,
}

/// `(attester_id, signature_bytes, signed_at_ms)` — one attester's
/// signature over a `MessageId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSignature {
    pub attester_id: u8,
    pub scheme: SignatureScheme,
    #[serde(with = "hex_bytes_vec")]
    pub signature: Vec<u8>,
    pub signed_at_ms: u64,
}

mod hex_bytes_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// Lifecycle state of an [`Attestation`] (spec.md §3).
///
/// `expired` is never stored as a mutation: it is derived by comparing
/// `now` against `expires_at_ms` (see [`Attestation::status_at`]). The
/// `signatures` set only ever grows, and the only stored transition is
/// `pending -> ready -> relayed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttestationStatus {
    Pending,
    Ready,
    Relayed,
}

/// `(message_id, message_bytes, source/dest domains, nonce, signatures,
/// status, created/expires)` — the full record tracked per `MessageId`
/// inside one attester's store (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attestation {
    pub message_id: MessageId,
    #[serde(with = "hex_bytes_vec")]
    pub message_bytes: Vec<u8>,
    pub source_domain: Domain,
    pub destination_domain: Domain,
    pub nonce: u64,
    pub signatures: Vec<PartialSignature>,
    pub status: AttestationStatus,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
}

impl Attestation {
    /// Default attestation lifetime, per spec.md §3.
    pub const DEFAULT_TTL_MS: u64 = 60 * 60 * 1000;

    /// The externally-visible status at time `now`: `expired` is a
    /// timeout derivation layered on top of the stored `status`, never a
    /// stored value itself (spec.md §3).
    pub fn status_at(&self, now_ms: u64) -> ObservedStatus {
        if now_ms >= self.expires_at_ms && self.status != AttestationStatus::Relayed {
            ObservedStatus::Expired
        } else {
            match self.status {
                AttestationStatus::Pending => ObservedStatus::Pending,
                AttestationStatus::Ready => ObservedStatus::Ready,
                AttestationStatus::Relayed => ObservedStatus::Relayed,
            }
        }
    }

    /// Signatures ordered by `attester_id` ascending, the order the
    /// destination chain's verifier expects (spec.md §3 `ReadyAttestation`).
    pub fn signatures_ordered(&self) -> Vec<PartialSignature> {
        let mut sigs = self.signatures.clone();
        sigs.sort_by_key(|s| s.attester_id);
        sigs
    }
}

/// The four states a caller can observe via `status_at`/the HTTP API
/// (spec.md §3: `pending | ready | relayed | expired`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservedStatus {
    Pending,
    Ready,
    Relayed,
    Expired,
}

/// Outward projection of an [`Attestation`] with `status in {ready,
/// relayed}` — what the fetcher consumes and the submitter relays
/// (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyAttestation {
    pub message_id: MessageId,
    #[serde(with = "hex_bytes_vec")]
    pub message_bytes: Vec<u8>,
    pub signatures_ordered: Vec<PartialSignature>,
    pub destination_domain: Domain,
}

impl ReadyAttestation {
    pub fn from_attestation(a: &Attestation) -> Option<Self> {
        match a.status {
            AttestationStatus::Ready | AttestationStatus::Relayed => Some(ReadyAttestation {
                message_id: a.message_id,
                message_bytes: a.message_bytes.clone(),
                signatures_ordered: a.signatures_ordered(),
                destination_domain: a.destination_domain,
            }),
            AttestationStatus::Pending => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(id: u8) -> PartialSignature {
        PartialSignature {
            attester_id: id,
            scheme: SignatureScheme::EcdsaSecp256k1,
            signature: vec![0; 65],
            signed_at_ms: 0,
        }
    }

    fn attestation_with(signatures: Vec<PartialSignature>, status: AttestationStatus) -> Attestation {
        Attestation {
            message_id: MessageId([1; 32]),
            message_bytes: vec![0; 128],
            source_domain: Domain::EVM_ETHEREUM,
            destination_domain: Domain::SUBSTRATE,
            nonce: 1,
            signatures,
            status,
            created_at_ms: 0,
            expires_at_ms: Attestation::DEFAULT_TTL_MS,
        }
    }

    #[test]
    fn signatures_are_ordered_by_attester_id() {
        let a = attestation_with(vec![sig(5), sig(1), sig(3)], AttestationStatus::Ready);
        let ids: Vec<u8> = a.signatures_ordered().iter().map(|s| s.attester_id).collect();
        assert_eq!(ids, vec![1, 3, 5]);
    }

    #[test]
    fn expired_overrides_pending_but_not_relayed() {
        let pending = attestation_with(vec![], AttestationStatus::Pending);
        assert_eq!(
            pending.status_at(Attestation::DEFAULT_TTL_MS + 1),
            ObservedStatus::Expired
        );
        let relayed = attestation_with(vec![sig(1)], AttestationStatus::Relayed);
        assert_eq!(
            relayed.status_at(Attestation::DEFAULT_TTL_MS + 1),
            ObservedStatus::Relayed
        );
    }

    #[test]
    fn ready_attestation_not_produced_while_pending() {
        let pending = attestation_with(vec![], AttestationStatus::Pending);
        assert!(ReadyAttestation::from_attestation(&pending).is_none());
        let ready = attestation_with(vec![sig(1)], AttestationStatus::Ready);
        assert!(ReadyAttestation::from_attestation(&ready).is_some());
    }
}
