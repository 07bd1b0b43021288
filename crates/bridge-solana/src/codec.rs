//! Parser for the Solana source's memo carrier (spec.md §6.2).
//!
//! spec.md is explicit and twice-flagged "(exact format)": the carrier is
//! `"ETRID:"` followed by exactly 64 lowercase hex characters — nothing
//! else. This module decodes only what that carrier can hold,
//! `destination_domain` and `recipient`; `amount`, `sender`, and `nonce` are
//! never read from memo text, since a memo is just a log line anyone can
//! attach to any transaction. The adapter derives those three fields from
//! the SPL-token-transfer instruction the memo is paired with in the same
//! transaction (see `adapter.rs`), the same way `bridge-evm`'s codec derives
//! `amount` from the CCTP message body rather than from a self-declared
//! value.

use bridge_types::{Domain, ObservedMessage, TokenRef};

const PREFIX: &str = "ETRID:";
/// spec.md §6.2: "UTF-8 text, exactly `\"ETRID:\"` followed by 64 lowercase
/// hex characters" — 32 bytes total, no more.
const PAYLOAD_HEX_LEN: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MemoDecodeError {
    #[error("memo does not start with the expected \"{PREFIX}\" tag")]
    MissingPrefix,
    #[error("memo payload has the wrong length: expected {PAYLOAD_HEX_LEN} hex chars, got {0}")]
    WrongLength(usize),
    #[error("memo payload contains invalid hex: {0}")]
    InvalidHex(String),
}

/// The carrier's 32-byte payload: one tag byte selecting `destination_domain`
/// followed by a 31-byte recipient tail. The tail is left-padded to the
/// canonical 32-byte `recipient` on normalization (spec.md §3's "left-padded
/// address" convention), so 1 + 31 = 32 bytes matches the carrier's fixed
/// 64-hex-char width exactly.
pub struct DecodedCarrier {
    pub destination_domain: u32,
    pub recipient: [u8; 32],
}

/// Parses the fixed 64-hex-char payload following the `"ETRID:"` tag.
pub fn decode_memo(memo: &str) -> Result<DecodedCarrier, MemoDecodeError> {
    let payload = memo.strip_prefix(PREFIX).ok_or(MemoDecodeError::MissingPrefix)?;
    if payload.len() != PAYLOAD_HEX_LEN {
        return Err(MemoDecodeError::WrongLength(payload.len()));
    }
    let bytes = hex::decode(payload).map_err(|e| MemoDecodeError::InvalidHex(e.to_string()))?;
    debug_assert_eq!(bytes.len(), 32);

    let mut recipient = [0u8; 32];
    recipient[1..].copy_from_slice(&bytes[1..]);

    Ok(DecodedCarrier {
        destination_domain: bytes[0] as u32,
        recipient,
    })
}

/// Converts a decoded carrier plus the paired transfer instruction's own
/// `amount`/`sender` and the adapter-assigned `nonce` into the normalized
/// [`ObservedMessage`] shape.
#[allow(clippy::too_many_arguments)]
pub fn to_observed_message(
    carrier: &DecodedCarrier,
    amount: u128,
    sender: [u8; 32],
    nonce: u64,
    token: TokenRef,
    source_tx: Vec<u8>,
    source_slot: u64,
    source_timestamp_ms: u64,
    confirmations_seen: u32,
) -> ObservedMessage {
    ObservedMessage {
        source_domain: Domain::SOLANA,
        destination_domain: Domain(carrier.destination_domain),
        nonce,
        sender,
        recipient: carrier.recipient,
        amount,
        token,
        source_tx,
        source_block: source_slot,
        source_timestamp_ms,
        confirmations_seen,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_memo() -> String {
        let mut bytes = [0u8; 32];
        bytes[0] = 2; // destination_domain = Substrate
        bytes[4] = 0xAB;
        bytes[31] = 0xCD;
        format!("{PREFIX}{}", hex::encode(bytes))
    }

    #[test]
    fn decodes_domain_and_recipient_tail() {
        let memo = sample_memo();
        let decoded = decode_memo(&memo).unwrap();
        assert_eq!(decoded.destination_domain, 2);
        assert_eq!(decoded.recipient[0], 0);
        assert_eq!(decoded.recipient[4], 0xAB);
        assert_eq!(decoded.recipient[31], 0xCD);
    }

    #[test]
    fn rejects_missing_prefix() {
        let memo = sample_memo().replace(PREFIX, "OTHER:");
        assert_eq!(decode_memo(&memo), Err(MemoDecodeError::MissingPrefix));
    }

    #[test]
    fn rejects_wrong_length() {
        let mut memo = sample_memo();
        memo.push('0');
        assert_eq!(decode_memo(&memo), Err(MemoDecodeError::WrongLength(PAYLOAD_HEX_LEN + 1)));
    }

    #[test]
    fn rejects_invalid_hex() {
        let memo = format!("{PREFIX}{}", "z".repeat(PAYLOAD_HEX_LEN));
        assert!(matches!(decode_memo(&memo), Err(MemoDecodeError::InvalidHex(_))));
    }
}
