//! ECDSA secp256k1 signing for EVM-family destinations (spec.md §4.3).

use alloy_primitives::{Address, B256};
use alloy_signer::{Signer as AlloySigner, SignerSync};
use alloy_signer_local::PrivateKeySigner;
use bridge_types::MessageId;

/// Holds one attester's secp256k1 key material and signs `MessageId`s for
/// EVM-family destinations.
///
/// Construction requires the address to match the key so startup can fail
/// fast (spec.md §6.3, `ATTESTER_ADDRESS`) rather than silently running
/// with a mismatched identity.
pub struct EcdsaSigner {
    inner: PrivateKeySigner,
}

/// Errors from key construction or signing (spec.md §7, `Signing` kind —
/// fatal to the owning attester process).
#[derive(Debug, thiserror::Error)]
pub enum EcdsaSignerError {
    #[error("invalid secp256k1 private key: {0}")]
    InvalidKey(String),
    #[error("configured ATTESTER_ADDRESS {expected} does not match the key's address {actual}")]
    AddressMismatch { expected: Address, actual: Address },
    #[error("self-verification of a produced signature failed; aborting")]
    SelfVerifyFailed,
}

impl EcdsaSigner {
    /// Builds a signer from raw 32-byte key material, verifying it matches
    /// `expected_address` before returning (spec.md §4.3/§6.3).
    pub fn new(key_bytes: &[u8], expected_address: Address) -> Result<Self, EcdsaSignerError> {
        let key = B256::from_slice(key_bytes);
        let signer = PrivateKeySigner::from_bytes(&key)
            .map_err(|e| EcdsaSignerError::InvalidKey(e.to_string()))?;
        let actual = signer.address();
        if actual != expected_address {
            return Err(EcdsaSignerError::AddressMismatch {
                expected: expected_address,
                actual,
            });
        }
        Ok(Self { inner: signer })
    }

    pub fn address(&self) -> Address {
        self.inner.address()
    }

    /// Signs `message_id` under the Ethereum-signed-message prefix
    /// (`"\x19Ethereum Signed Message:\n32" || message_id`), producing a
    /// 65-byte `(r, s, v)` signature, and self-verifies the result before
    /// returning it (spec.md §4.3).
    pub fn sign(&self, message_id: MessageId) -> Result<Vec<u8>, EcdsaSignerError> {
        let signature = self
            .inner
            .sign_message_sync(message_id.as_bytes())
            .map_err(|_| EcdsaSignerError::SelfVerifyFailed)?;
        let bytes = signature.as_bytes().to_vec();
        let recovered = signature
            .recover_address_from_msg(message_id.as_bytes())
            .map_err(|_| EcdsaSignerError::SelfVerifyFailed)?;
        if recovered != self.inner.address() {
            return Err(EcdsaSignerError::SelfVerifyFailed);
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_address() {
        let key = [0x11u8; 32];
        let wrong_address = Address::from([0xAAu8; 20]);
        let result = EcdsaSigner::new(&key, wrong_address);
        assert!(result.is_err());
    }

    #[test]
    fn signs_and_self_verifies() {
        let key = [0x11u8; 32];
        let signer_for_address = PrivateKeySigner::from_bytes(&B256::from_slice(&key)).unwrap();
        let address = signer_for_address.address();
        let signer = EcdsaSigner::new(&key, address).unwrap();
        let message_id = MessageId([7u8; 32]);
        let sig = signer.sign(message_id).unwrap();
        assert_eq!(sig.len(), 65);
    }
}
