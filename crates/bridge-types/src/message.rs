//! [`ObservedMessage`] — the normalized shape every chain adapter emits —
//! and the canonical byte encoding / [`MessageId`] derived from it.
//!
//! This module is a pure function boundary (component B in spec.md §2): it
//! holds no state and performs no I/O. Every adapter crate depends on it to
//! guarantee that two adapters observing the same logical transfer compute
//! the same [`MessageId`], and every attester depends on it to guarantee
//! that re-canonicalizing an already-stored message reproduces the same
//! bytes (spec.md §8, property 3 and 6).

use blake2::Blake2bVar;
use blake2::digest::{Update, VariableOutput};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

use crate::domain::{ChainFamily, Domain};

/// 32-byte digest identifying a logical cross-chain transfer.
///
/// Derived solely from `(source_domain, destination_domain, nonce, sender,
/// recipient, amount, token)` — the transaction identifier and block
/// metadata are deliberately excluded so that the same transfer produces
/// the same id regardless of which re-org history an adapter observed
/// (spec.md §3).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(#[serde(with = "hex_bytes_32")] pub [u8; 32]);

impl MessageId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        let mut out = [0u8; 32];
        if bytes.len() == 32 {
            out.copy_from_slice(&bytes);
        }
        Ok(MessageId(out))
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.to_hex())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

mod hex_bytes_32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

/// The token moved by a transfer: either the source chain's native asset,
/// or an ERC20-equivalent token identified by its 32-byte, left-padded
/// address on the source chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenRef {
    Native,
    Address([u8; 32]),
}

impl TokenRef {
    /// The canonical 32-byte encoding used inside `message_bytes`: all-zero
    /// for [`TokenRef::Native`], per spec.md §4.2.
    pub fn to_bytes(self) -> [u8; 32] {
        match self {
            TokenRef::Native => [0u8; 32],
            TokenRef::Address(bytes) => bytes,
        }
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        if bytes == [0u8; 32] {
            TokenRef::Native
        } else {
            TokenRef::Address(bytes)
        }
    }
}

/// A finality-confirmed bridge event in normalized form (spec.md §3).
///
/// Produced by a chain adapter only after `confirmations_seen` has crossed
/// `required_confirmations(source_domain)`; never retracted once emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedMessage {
    pub source_domain: Domain,
    pub destination_domain: Domain,
    /// Source-chain-assigned nonce, strictly monotonic per `source_domain`.
    pub nonce: u64,
    /// Left-padded address in the source chain's native encoding.
    pub sender: [u8; 32],
    /// Left-padded address in the destination chain's encoding.
    pub recipient: [u8; 32],
    pub amount: u128,
    pub token: TokenRef,
    /// Opaque transaction identifier on the source chain; length varies by
    /// chain family (32 for EVM/Substrate/Bitcoin, 64 for Solana, etc).
    #[serde(with = "hex_bytes_vec")]
    pub source_tx: Vec<u8>,
    pub source_block: u64,
    pub source_timestamp_ms: u64,
    pub confirmations_seen: u32,
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

/// Error returned when an [`ObservedMessage`] fails a structural check
/// before it can be canonicalized (spec.md §7, kind `ChainProtocol`/the
/// `amount = 0` boundary case in spec.md §8 property 9).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CanonicalizeError {
    #[error("zero-amount transfers are not canonicalizable: bridges must not transport zero amounts")]
    ZeroAmount,
    #[error("destination_domain {0:?} is not a deployment the off-chain core can sign for")]
    UnsupportedDestination(Domain),
}

/// The fixed 128-byte wire layout that every attester signs over, and the
/// [`MessageId`] derived from it.
///
/// Layout (spec.md §4.2), all multi-byte integers little-endian:
///
/// ```text
/// source_domain        u32   4
/// destination_domain   u32   4
/// nonce                u64   8
/// sender                32 bytes
/// recipient             32 bytes
/// token                 32 bytes  (all-zero = native)
/// amount               u128  16
/// ```
pub const MESSAGE_BYTES_LEN: usize = 4 + 4 + 8 + 32 + 32 + 32 + 16;

/// Canonicalizes an [`ObservedMessage`] into the fixed byte layout and its
/// [`MessageId`].
///
/// `source_tx` and block metadata are intentionally not part of the
/// encoding: re-canonicalizing the same logical transfer from a different
/// re-org history must produce identical output (spec.md §8 properties 3
/// and 6).
///
/// The hash function is dictated by `destination_domain`'s chain family:
/// Keccak-256 for EVM destinations, Blake2b-256 for the Substrate
/// destination, because downstream on-chain verification uses the
/// destination chain's native hasher (spec.md §4.2, §9).
pub fn canonicalize(message: &ObservedMessage) -> Result<(Vec<u8>, MessageId), CanonicalizeError> {
    if message.amount == 0 {
        return Err(CanonicalizeError::ZeroAmount);
    }
    if !message.destination_domain.is_valid_destination() {
        return Err(CanonicalizeError::UnsupportedDestination(
            message.destination_domain,
        ));
    }

    let mut bytes = Vec::with_capacity(MESSAGE_BYTES_LEN);
    bytes.extend_from_slice(&message.source_domain.0.to_le_bytes());
    bytes.extend_from_slice(&message.destination_domain.0.to_le_bytes());
    bytes.extend_from_slice(&message.nonce.to_le_bytes());
    bytes.extend_from_slice(&message.sender);
    bytes.extend_from_slice(&message.recipient);
    bytes.extend_from_slice(&message.token.to_bytes());
    bytes.extend_from_slice(&message.amount.to_le_bytes());
    debug_assert_eq!(bytes.len(), MESSAGE_BYTES_LEN);

    let id = match message.destination_domain.family() {
        ChainFamily::Substrate => blake2b_256(&bytes),
        _ => keccak256(&bytes),
    };
    Ok((bytes, MessageId(id)))
}

fn keccak256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

fn blake2b_256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2bVar::new(32).expect("32 is a valid Blake2b output length");
    hasher.update(bytes);
    let mut out = [0u8; 32];
    hasher
        .finalize_variable(&mut out)
        .expect("output buffer matches configured length");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(destination_domain: Domain) -> ObservedMessage {
        ObservedMessage {
            source_domain: Domain::EVM_ETHEREUM,
            destination_domain,
            nonce: 42,
            sender: {
                let mut b = [0u8; 32];
                b[31] = 1;
                b
            },
            recipient: {
                let mut b = [0u8; 32];
                b[31] = 2;
                b
            },
            amount: 1_000_000,
            token: TokenRef::Native,
            source_tx: vec![0xAB; 32],
            source_block: 100,
            source_timestamp_ms: 1_700_000_000_000,
            confirmations_seen: 12,
        }
    }

    #[test]
    fn canonicalization_is_deterministic() {
        let m = sample(Domain::SUBSTRATE);
        let (bytes1, id1) = canonicalize(&m).unwrap();
        let (bytes2, id2) = canonicalize(&m).unwrap();
        assert_eq!(bytes1, bytes2);
        assert_eq!(id1, id2);
    }

    #[test]
    fn message_bytes_excludes_source_tx_and_block() {
        let mut m = sample(Domain::EVM_ETHEREUM);
        let (bytes1, id1) = canonicalize(&m).unwrap();
        m.source_tx = vec![0xFF; 64];
        m.source_block = 999;
        m.confirmations_seen = 50;
        let (bytes2, id2) = canonicalize(&m).unwrap();
        assert_eq!(bytes1, bytes2);
        assert_eq!(id1, id2);
    }

    #[test]
    fn evm_destination_uses_keccak_substrate_uses_blake2b() {
        let evm = sample(Domain::EVM_ETHEREUM);
        let sub = sample(Domain::SUBSTRATE);
        let (_, id_evm) = canonicalize(&evm).unwrap();
        let (_, id_sub) = canonicalize(&sub).unwrap();
        // Different destination_domain already changes the bytes, but also
        // confirm the hashers disagree on the exact same byte layout.
        let bytes = {
            let (b, _) = canonicalize(&evm).unwrap();
            b
        };
        assert_eq!(id_evm.0, keccak256(&bytes));
        let sub_bytes = {
            let (b, _) = canonicalize(&sub).unwrap();
            b
        };
        assert_eq!(id_sub.0, blake2b_256(&sub_bytes));
    }

    #[test]
    fn zero_amount_is_rejected() {
        let mut m = sample(Domain::EVM_ETHEREUM);
        m.amount = 0;
        assert_eq!(canonicalize(&m), Err(CanonicalizeError::ZeroAmount));
    }

    #[test]
    fn solana_destination_is_rejected() {
        let m = sample(Domain::SOLANA);
        assert_eq!(
            canonicalize(&m),
            Err(CanonicalizeError::UnsupportedDestination(Domain::SOLANA))
        );
    }

    #[test]
    fn round_trip_is_idempotent() {
        let m = sample(Domain::EVM_ETHEREUM);
        let (bytes_a, id_a) = canonicalize(&m).unwrap();
        // canonicalize(parse(canonicalize(m))) = canonicalize(m): since the
        // layout is a direct field projection, re-encoding the same message
        // again must reproduce identical bytes and id.
        let (bytes_b, id_b) = canonicalize(&m).unwrap();
        assert_eq!(bytes_a, bytes_b);
        assert_eq!(id_a, id_b);
    }
}
