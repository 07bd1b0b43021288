//! Dispatches signing to the ECDSA or Sr25519 scheme by `destination_domain`
//! (spec.md §4.3, "Dual signing" design note in spec.md §9).

use bridge_evm::signer::{EcdsaSigner, EcdsaSignerError};
use bridge_substrate::signer::{Sr25519Signer, Sr25519SignerError};
use bridge_types::attestation::{PartialSignature, SignatureScheme};
use bridge_types::domain::{ChainFamily, Domain};
use bridge_types::message::MessageId;

/// Errors from the signing dispatch itself (spec.md §7, `Signing` kind —
/// every variant here is fatal to the attester process).
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("destination_domain {0:?} is not a family this deployment signs for")]
    UnsupportedDestination(Domain),
    #[error("no ECDSA key loaded; this attester cannot sign for EVM-family destinations")]
    EcdsaNotConfigured,
    #[error("no Sr25519 key loaded; this attester cannot sign for the Substrate destination")]
    Sr25519NotConfigured,
    #[error(transparent)]
    Ecdsa(#[from] EcdsaSignerError),
    #[error(transparent)]
    Sr25519(#[from] Sr25519SignerError),
}

/// One attester's key material, dispatched by the chain family of the
/// `destination_domain` it is asked to sign for (spec.md §4.3).
pub struct Signer {
    ecdsa: Option<EcdsaSigner>,
    sr25519: Option<Sr25519Signer>,
    attester_id: u8,
}

impl Signer {
    pub fn new(ecdsa: Option<EcdsaSigner>, sr25519: Option<Sr25519Signer>, attester_id: u8) -> Self {
        Self {
            ecdsa,
            sr25519,
            attester_id,
        }
    }

    /// Signs `message_id` for `destination_domain`, producing a
    /// `PartialSignature` tagged with this attester's own identity. Both
    /// underlying signers self-verify before returning (spec.md §4.3); a
    /// mismatch surfaces here as an error the caller must treat as fatal.
    pub fn sign(
        &self,
        message_id: MessageId,
        destination_domain: Domain,
        signed_at_ms: u64,
    ) -> Result<PartialSignature, SignerError> {
        match destination_domain.family() {
            ChainFamily::Evm => {
                let ecdsa = self.ecdsa.as_ref().ok_or(SignerError::EcdsaNotConfigured)?;
                let signature = ecdsa.sign(message_id)?;
                Ok(PartialSignature {
                    attester_id: self.attester_id,
                    scheme: SignatureScheme::EcdsaSecp256k1,
                    signature,
                    signed_at_ms,
                })
            }
            ChainFamily::Substrate => {
                let sr25519 = self.sr25519.as_ref().ok_or(SignerError::Sr25519NotConfigured)?;
                let signature = sr25519.sign(message_id)?;
                Ok(PartialSignature {
                    attester_id: self.attester_id,
                    scheme: SignatureScheme::Sr25519,
                    signature,
                    signed_at_ms,
                })
            }
            _ => Err(SignerError::UnsupportedDestination(destination_domain)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256};
    use alloy_signer::Signer as AlloySigner;
    use alloy_signer_local::PrivateKeySigner;
    use sp_core::Pair;
    use sp_core::sr25519;

    fn ecdsa_signer() -> EcdsaSigner {
        let key = [0x11u8; 32];
        let local = PrivateKeySigner::from_bytes(&B256::from_slice(&key)).unwrap();
        EcdsaSigner::new(&key, local.address()).unwrap()
    }

    fn sr25519_signer() -> Sr25519Signer {
        let seed = [0x22u8; 32];
        let pair = sr25519::Pair::from_seed(&seed);
        Sr25519Signer::from_seed(seed, &sp_core::crypto::Ss58Codec::to_ss58check(&pair.public())).unwrap()
    }

    #[test]
    fn dispatches_by_destination_family() {
        let signer = Signer::new(Some(ecdsa_signer()), Some(sr25519_signer()), 3);
        let message_id = MessageId([9u8; 32]);

        let evm_sig = signer.sign(message_id, Domain::EVM_ETHEREUM, 0).unwrap();
        assert_eq!(evm_sig.scheme, SignatureScheme::EcdsaSecp256k1);
        assert_eq!(evm_sig.signature.len(), 65);

        let sub_sig = signer.sign(message_id, Domain::SUBSTRATE, 0).unwrap();
        assert_eq!(sub_sig.scheme, SignatureScheme::Sr25519);
        assert_eq!(sub_sig.signature.len(), 64);
    }

    #[test]
    fn rejects_unsupported_destination() {
        let signer = Signer::new(Some(ecdsa_signer()), Some(sr25519_signer()), 3);
        let err = signer.sign(MessageId([0u8; 32]), Domain::SOLANA, 0).unwrap_err();
        assert!(matches!(err, SignerError::UnsupportedDestination(_)));
    }

    #[test]
    fn missing_key_fails_clearly() {
        let signer = Signer::new(None, Some(sr25519_signer()), 3);
        let err = signer.sign(MessageId([0u8; 32]), Domain::EVM_ETHEREUM, 0).unwrap_err();
        assert!(matches!(err, SignerError::EcdsaNotConfigured));
    }
}
