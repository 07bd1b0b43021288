//! Sr25519 signing for the Substrate destination (spec.md §4.3).

use bridge_types::MessageId;
use sp_core::crypto::Ss58Codec;
use sp_core::{Pair, sr25519};
use zeroize::Zeroizing;

/// Holds one attester's Sr25519 key material and signs `MessageId`s for the
/// Substrate destination directly (no message prefix, unlike the EVM
/// scheme).
pub struct Sr25519Signer {
    pair: sr25519::Pair,
    // Retains the seed only to let `Drop` zero it; the `Pair` itself does
    // not expose its internal key material for zeroization.
    _seed: Zeroizing<[u8; 32]>,
}

#[derive(Debug, thiserror::Error)]
pub enum Sr25519SignerError {
    #[error("invalid Sr25519 SURI/seed: {0}")]
    InvalidKey(String),
    #[error("configured ATTESTER_ADDRESS {expected} does not match the key's public address {actual}")]
    AddressMismatch { expected: String, actual: String },
    #[error("self-verification of a produced signature failed; aborting")]
    SelfVerifyFailed,
}

impl Sr25519Signer {
    /// Builds a signer from a raw 32-byte seed, verifying it produces
    /// `expected_ss58_address` before returning (spec.md §4.3/§6.3).
    pub fn from_seed(seed: [u8; 32], expected_ss58_address: &str) -> Result<Self, Sr25519SignerError> {
        let pair = sr25519::Pair::from_seed(&seed);
        let actual = pair.public().to_ss58check();
        if actual != expected_ss58_address {
            return Err(Sr25519SignerError::AddressMismatch {
                expected: expected_ss58_address.to_string(),
                actual,
            });
        }
        Ok(Self {
            pair,
            _seed: Zeroizing::new(seed),
        })
    }

    pub fn public(&self) -> sr25519::Public {
        self.pair.public()
    }

    /// The raw 32-byte public key, for reporting in an `AttesterIdentity`.
    pub fn public_bytes(&self) -> [u8; 32] {
        self.pair.public().0
    }

    /// Signs `message_id` directly (no prefix), producing a 64-byte
    /// signature, and self-verifies before returning it (spec.md §4.3).
    pub fn sign(&self, message_id: MessageId) -> Result<Vec<u8>, Sr25519SignerError> {
        let signature = self.pair.sign(message_id.as_bytes());
        if !sr25519::Pair::verify(&signature, message_id.as_bytes(), &self.pair.public()) {
            return Err(Sr25519SignerError::SelfVerifyFailed);
        }
        Ok(signature.0.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_address() {
        let seed = [0x11u8; 32];
        let result = Sr25519Signer::from_seed(seed, "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY");
        assert!(result.is_err());
    }

    #[test]
    fn signs_and_self_verifies() {
        let seed = [0x11u8; 32];
        let pair = sr25519::Pair::from_seed(&seed);
        let address = pair.public().to_ss58check();
        let signer = Sr25519Signer::from_seed(seed, &address).unwrap();
        let message_id = MessageId([7u8; 32]);
        let sig = signer.sign(message_id).unwrap();
        assert_eq!(sig.len(), 64);
    }
}
