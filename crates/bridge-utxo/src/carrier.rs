//! Shared decoder for the version-tagged carrier payload Bitcoin, TRON,
//! XRPL, Cardano, and Stellar all embed the same way: an OP_RETURN output
//! (Bitcoin), a transaction note (TRON), a `Memos` entry (XRPL), metadata
//! label 674 (Cardano), or the Horizon `memo` field (Stellar) (spec.md
//! §4.1, §6.2): `<domain:u8><recipient:32>`, 33 bytes total.
//!
//! Unlike Solana's textual `"ETRID:"` memo, this payload is raw binary —
//! these chains' carrier fields are general-purpose byte/text blobs with no
//! program-level framing to anchor a prefix search against, so the adapter
//! instead requires the field to be exactly 33 bytes and nothing else.

use bridge_types::Domain;

pub const CARRIER_LEN: usize = 1 + 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CarrierDecodeError {
    #[error("carrier payload has the wrong length: expected {CARRIER_LEN} bytes, got {0}")]
    WrongLength(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarrierPayload {
    pub destination_domain: Domain,
    pub recipient: [u8; 32],
}

/// Decodes `<domain:u8><recipient:32>` out of a carrier field's raw bytes.
pub fn decode_carrier(bytes: &[u8]) -> Result<CarrierPayload, CarrierDecodeError> {
    if bytes.len() != CARRIER_LEN {
        return Err(CarrierDecodeError::WrongLength(bytes.len()));
    }
    let mut recipient = [0u8; 32];
    recipient.copy_from_slice(&bytes[1..]);
    Ok(CarrierPayload {
        destination_domain: Domain(bytes[0] as u32),
        recipient,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_well_formed_payload() {
        let mut bytes = vec![0u8]; // destination_domain = EVM-Ethereum
        bytes.extend_from_slice(&[7u8; 32]);
        let decoded = decode_carrier(&bytes).unwrap();
        assert_eq!(decoded.destination_domain, Domain::EVM_ETHEREUM);
        assert_eq!(decoded.recipient, [7u8; 32]);
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(decode_carrier(&[0u8; 10]), Err(CarrierDecodeError::WrongLength(10)));
        assert_eq!(decode_carrier(&[0u8; 34]), Err(CarrierDecodeError::WrongLength(34)));
    }
}
