//! Decoder for the CCTP-style message body emitted by EVM source chains
//! (spec.md §6.2), and the destination-side calldata encoding the
//! submitter sends to the message-transmitter contract (spec.md §4.7).
//!
//! These are deliberately two different encodings from `bridge_types`'s
//! 128-byte canonical `message_bytes`: this module's `CctpMessage` is the
//! *on-chain source-chain* wire format an EVM adapter must parse out of a
//! `MessageSent` log to build an [`ObservedMessage`]; the canonical
//! `message_bytes` is what gets signed and is what the submitter actually
//! relays. All integers here are big-endian, matching EVM's native
//! encoding (spec.md §6.2), unlike the little-endian canonical layout.

use bridge_types::{Domain, ObservedMessage, TokenRef};

/// Header + token-transfer body decoded from an EVM `MessageSent` log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CctpMessage {
    pub version: u32,
    pub source_domain: u32,
    pub destination_domain: u32,
    pub nonce: u64,
    pub sender: [u8; 32],
    pub recipient: [u8; 32],
    pub destination_caller: [u8; 32],
    pub burn_token: [u8; 32],
    pub mint_recipient: [u8; 32],
    pub amount: u128,
    pub message_sender: [u8; 32],
}

/// Errors decoding a CCTP-style message body (spec.md §7, `ChainProtocol`
/// kind: the event is skipped, not retried).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CctpDecodeError {
    #[error("message too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("amount exceeds u128 range (values above 2^128-1 are rejected)")]
    AmountOverflow,
}

const HEADER_LEN: usize = 4 + 4 + 4 + 8 + 32 + 32 + 32;
const BODY_FIXED_LEN: usize = 4 + 32 + 32 + 32 + 32;

/// Decodes the fixed CCTP header + token-transfer body. `body` in the wire
/// format is `bodyVersion | burnToken | mintRecipient | amount (32-byte
/// big-endian word) | messageSender`; amounts above `u128::MAX` are
/// rejected per spec.md §6.2.
pub fn decode_message(bytes: &[u8]) -> Result<CctpMessage, CctpDecodeError> {
    if bytes.len() < HEADER_LEN + BODY_FIXED_LEN {
        return Err(CctpDecodeError::TooShort {
            expected: HEADER_LEN + BODY_FIXED_LEN,
            actual: bytes.len(),
        });
    }
    let mut cursor = 0usize;
    let mut read_u32 = || {
        let v = u32::from_be_bytes(bytes[cursor..cursor + 4].try_into().unwrap());
        cursor += 4;
        v
    };
    let version = read_u32();
    let source_domain = read_u32();
    let destination_domain = read_u32();

    let nonce = u64::from_be_bytes(bytes[cursor..cursor + 8].try_into().unwrap());
    cursor += 8;

    let mut read_32 = |c: &mut usize| {
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes[*c..*c + 32]);
        *c += 32;
        out
    };
    let sender = read_32(&mut cursor);
    let recipient = read_32(&mut cursor);
    let destination_caller = read_32(&mut cursor);

    let body_version = u32::from_be_bytes(bytes[cursor..cursor + 4].try_into().unwrap());
    cursor += 4;
    let _ = body_version;
    let burn_token = read_32(&mut cursor);
    let mint_recipient = read_32(&mut cursor);
    let amount_word = read_32(&mut cursor);
    let amount = amount_word_to_u128(&amount_word)?;
    let message_sender = read_32(&mut cursor);

    Ok(CctpMessage {
        version,
        source_domain,
        destination_domain,
        nonce,
        sender,
        recipient,
        destination_caller,
        burn_token,
        mint_recipient,
        amount,
        message_sender,
    })
}

/// A 256-bit big-endian amount word is only representable as `u128` when
/// its top 16 bytes are zero; anything larger is rejected per spec.md §6.2.
fn amount_word_to_u128(word: &[u8; 32]) -> Result<u128, CctpDecodeError> {
    if word[..16].iter().any(|b| *b != 0) {
        return Err(CctpDecodeError::AmountOverflow);
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

/// Converts a decoded CCTP message plus the transaction metadata an
/// adapter observed into the normalized [`ObservedMessage`] shape.
#[allow(clippy::too_many_arguments)]
pub fn to_observed_message(
    msg: &CctpMessage,
    source_domain: Domain,
    source_tx: Vec<u8>,
    source_block: u64,
    source_timestamp_ms: u64,
    confirmations_seen: u32,
) -> ObservedMessage {
    let token = if msg.burn_token == [0u8; 32] {
        TokenRef::Native
    } else {
        TokenRef::Address(msg.burn_token)
    };
    ObservedMessage {
        source_domain,
        destination_domain: Domain(msg.destination_domain),
        nonce: msg.nonce,
        sender: msg.sender,
        recipient: msg.mint_recipient,
        amount: msg.amount,
        token,
        source_tx,
        source_block,
        source_timestamp_ms,
        confirmations_seen,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bytes(amount_be: [u8; 32]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0u32.to_be_bytes()); // version
        bytes.extend_from_slice(&0u32.to_be_bytes()); // sourceDomain
        bytes.extend_from_slice(&2u32.to_be_bytes()); // destinationDomain
        bytes.extend_from_slice(&42u64.to_be_bytes()); // nonce
        bytes.extend_from_slice(&[1u8; 32]); // sender
        bytes.extend_from_slice(&[2u8; 32]); // recipient
        bytes.extend_from_slice(&[0u8; 32]); // destinationCaller
        bytes.extend_from_slice(&0u32.to_be_bytes()); // bodyVersion
        bytes.extend_from_slice(&[0u8; 32]); // burnToken (native)
        bytes.extend_from_slice(&[2u8; 32]); // mintRecipient
        bytes.extend_from_slice(&amount_be); // amount
        bytes.extend_from_slice(&[9u8; 32]); // messageSender
        bytes
    }

    #[test]
    fn decodes_a_well_formed_message() {
        let mut amount = [0u8; 32];
        amount[28..].copy_from_slice(&1_000_000u32.to_be_bytes());
        let bytes = sample_bytes(amount);
        let decoded = decode_message(&bytes).unwrap();
        assert_eq!(decoded.nonce, 42);
        assert_eq!(decoded.destination_domain, 2);
        assert_eq!(decoded.amount, 1_000_000);
    }

    #[test]
    fn rejects_amount_above_u128() {
        let mut amount = [0xFF; 32];
        amount[..16].copy_from_slice(&[1u8; 16]); // nonzero high bytes
        let bytes = sample_bytes(amount);
        assert_eq!(
            decode_message(&bytes),
            Err(CctpDecodeError::AmountOverflow)
        );
    }

    #[test]
    fn rejects_truncated_message() {
        let bytes = sample_bytes([0u8; 32]);
        assert!(decode_message(&bytes[..10]).is_err());
    }
}
