//! Decoder for the `tokenMessenger::BurnMessageSent` pallet event
//! (spec.md §6.2): `(nonce:u64, destination_domain:u32, sender:AccountId(32),
//! amount:u128, recipient:[u8;32])`, SCALE-encoded.

use bridge_types::{Domain, ObservedMessage, TokenRef};
use parity_scale_codec::Decode;

/// Fields of one `BurnMessageSent` event, decoded in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct BurnMessageSent {
    pub nonce: u64,
    pub destination_domain: u32,
    pub sender: [u8; 32],
    pub amount: u128,
    pub recipient: [u8; 32],
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScaleDecodeError {
    #[error("failed to SCALE-decode BurnMessageSent event: {0}")]
    Codec(String),
}

/// Decodes the raw SCALE-encoded field bytes subxt hands back for a
/// `tokenMessenger::BurnMessageSent` event (spec.md §6.2, `ChainProtocol`
/// kind on failure: the event is skipped, not retried).
pub fn decode_burn_message_sent(mut bytes: &[u8]) -> Result<BurnMessageSent, ScaleDecodeError> {
    BurnMessageSent::decode(&mut bytes).map_err(|e| ScaleDecodeError::Codec(e.to_string()))
}

/// Converts a decoded event plus transaction metadata into the normalized
/// [`ObservedMessage`] shape. The relay chain's native token is the only
/// asset this bridge observes burns of, so `token` is always
/// [`TokenRef::Native`].
pub fn to_observed_message(
    event: &BurnMessageSent,
    source_tx: Vec<u8>,
    source_block: u64,
    source_timestamp_ms: u64,
    confirmations_seen: u32,
) -> ObservedMessage {
    ObservedMessage {
        source_domain: Domain::SUBSTRATE,
        destination_domain: Domain(event.destination_domain),
        nonce: event.nonce,
        sender: event.sender,
        recipient: event.recipient,
        amount: event.amount,
        token: TokenRef::Native,
        source_tx,
        source_block,
        source_timestamp_ms,
        confirmations_seen,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parity_scale_codec::Encode;

    fn sample() -> BurnMessageSent {
        BurnMessageSent {
            nonce: 7,
            destination_domain: 0,
            sender: [1u8; 32],
            amount: 5_000_000,
            recipient: [2u8; 32],
        }
    }

    #[test]
    fn round_trips_through_scale() {
        let event = sample();
        let bytes = event.encode();
        let decoded = decode_burn_message_sent(&bytes).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn rejects_truncated_bytes() {
        let bytes = sample().encode();
        assert!(decode_burn_message_sent(&bytes[..4]).is_err());
    }

    #[test]
    fn to_observed_message_uses_native_token() {
        let event = sample();
        let observed = to_observed_message(&event, vec![0xAB; 32], 1000, 1_700_000_000_000, 2);
        assert_eq!(observed.token, TokenRef::Native);
        assert_eq!(observed.source_domain, Domain::SUBSTRATE);
        assert_eq!(observed.destination_domain, Domain::EVM_ETHEREUM);
    }
}
