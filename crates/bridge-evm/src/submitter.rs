//! Destination Submitter for EVM-family destinations (spec.md §4.7): turns
//! a ready [`ReadyAttestation`] into an EIP-1559 transaction calling the
//! message-transmitter contract's `receiveMessage(bytes, bytes)`, and walks
//! it through the submission state machine.

use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use bridge_types::attestation::ReadyAttestation;
use std::time::Duration;
use tracing::{info, warn};

/// EIP-1559 fee caps a submitter will never exceed (spec.md §4.7's "Gas
/// policy"), plus an optional gas limit override.
#[derive(Debug, Clone, Copy, Default)]
pub struct GasPolicy {
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    pub gas_limit: Option<u64>,
}

/// `receiveMessage(bytes message, bytes signatures)` selector: the first
/// four bytes of `keccak256("receiveMessage(bytes,bytes)")`.
const RECEIVE_MESSAGE_SELECTOR: [u8; 4] = [0x57, 0xec, 0xfd, 0x28];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Queued,
    InFlight,
    Confirmed,
    Failed,
    Rejected,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("transport error sending transaction: {0}")]
    Transport(String),
    #[error("destination contract reverted the transaction")]
    Reverted,
    #[error("exhausted retry budget after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

/// Submits signed attestations to one EVM-family destination contract,
/// tracking a local nonce and retrying with bounded exponential backoff
/// (spec.md §4.7: 3 attempts, 60s base).
pub struct EvmSubmitter {
    provider: DynProvider,
    destination_address: Address,
    signer_address: Address,
    max_attempts: u32,
    base_backoff: Duration,
    gas_policy: GasPolicy,
}

impl EvmSubmitter {
    pub fn new(rpc_url: url::Url, signer: PrivateKeySigner, destination_address: Address) -> Self {
        let signer_address = signer.address();
        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(rpc_url)
            .erased();
        Self {
            provider,
            destination_address,
            signer_address,
            max_attempts: 3,
            base_backoff: Duration::from_secs(60),
            gas_policy: GasPolicy::default(),
        }
    }

    /// Overrides the default 3-attempt/60s-base retry policy (spec.md
    /// §4.7, configurable via `MAX_RETRIES`/`RETRY_DELAY_MS`, spec.md
    /// §6.3).
    pub fn with_retry_policy(mut self, max_attempts: u32, base_backoff: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.base_backoff = base_backoff;
        self
    }

    /// Sets the EIP-1559 fee caps and gas limit this submitter will honor
    /// (spec.md §4.7, `GAS_LIMIT`/`MAX_FEE_PER_GAS`/`MAX_PRIORITY_FEE_PER_GAS`,
    /// spec.md §6.3).
    pub fn with_gas_policy(mut self, gas_policy: GasPolicy) -> Self {
        self.gas_policy = gas_policy;
        self
    }

    /// Encodes and submits one ready attestation, retrying transport
    /// failures up to `max_attempts` times with exponential backoff;
    /// a contract revert is terminal (`Rejected`), never retried.
    pub async fn submit(&self, ready: &ReadyAttestation) -> Result<SubmissionState, SubmitError> {
        // at-most-one-in-flight-per-message_id is enforced by the caller
        // (RelayDispatcher), which keys in-flight submissions per message_id
        // before a submitter is ever reached.
        let calldata = encode_receive_message(&ready.message_bytes, &concat_signatures(ready));
        let mut attempt = 0u32;
        let result = loop {
            attempt += 1;

            let mut request = TransactionRequest::default()
                .with_to(self.destination_address)
                .with_from(self.signer_address)
                .with_input(Bytes::from(calldata.clone()));
            if let Some(gas_limit) = self.gas_policy.gas_limit {
                request = request.with_gas_limit(gas_limit);
            }
            match self.capped_eip1559_fees().await {
                Ok(Some((max_fee, max_priority_fee))) => {
                    request = request
                        .with_max_fee_per_gas(max_fee)
                        .with_max_priority_fee_per_gas(max_priority_fee);
                }
                Ok(None) => {}
                Err(over_cap) => {
                    // spec.md §4.7: "reject if current network estimate
                    // exceeds the cap and retry later rather than overpay".
                    warn!(
                        estimated = over_cap,
                        cap = ?self.gas_policy.max_fee_per_gas,
                        message_id = %ready.message_id,
                        "current fee estimate exceeds configured cap, deferring submission"
                    );
                    if attempt >= self.max_attempts {
                        break Err(SubmitError::RetriesExhausted { attempts: attempt });
                    }
                    tokio::time::sleep(self.base_backoff * attempt).await;
                    continue;
                }
            }

            match self.provider.send_transaction(request).await {
                Ok(pending) => match pending.get_receipt().await {
                    Ok(receipt) => {
                        if receipt.status() {
                            break Ok(SubmissionState::Confirmed);
                        } else {
                            break Ok(SubmissionState::Rejected);
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, attempt, "failed to confirm submitted transaction");
                        if attempt >= self.max_attempts {
                            break Err(SubmitError::RetriesExhausted { attempts: attempt });
                        }
                    }
                },
                Err(e) => {
                    warn!(error = %e, attempt, "transaction send failed");
                    if attempt >= self.max_attempts {
                        break Err(SubmitError::RetriesExhausted { attempts: attempt });
                    }
                }
            }
            tokio::time::sleep(self.base_backoff * attempt).await;
        };
        info!(message_id = %ready.message_id, state = ?result, "submission attempt finished");
        result
    }

    /// Resolves the `(max_fee_per_gas, max_priority_fee_per_gas)` pair to
    /// use, clamped to the configured caps. Returns `Ok(None)` when no caps
    /// are configured (let the provider's default filler choose). Returns
    /// `Err(estimated_max_fee)` when the network's current estimate
    /// exceeds a configured cap, so the caller can defer rather than
    /// overpay.
    async fn capped_eip1559_fees(&self) -> Result<Option<(u128, u128)>, u128> {
        if self.gas_policy.max_fee_per_gas.is_none() && self.gas_policy.max_priority_fee_per_gas.is_none() {
            return Ok(None);
        }
        let estimate = match self.provider.estimate_eip1559_fees().await {
            Ok(estimate) => estimate,
            // Estimation failure isn't a cap violation; let send_transaction's
            // own filler resolve fees and surface any real transport error.
            Err(_) => return Ok(None),
        };
        let max_fee = self.gas_policy.max_fee_per_gas.unwrap_or(estimate.max_fee_per_gas);
        if estimate.max_fee_per_gas > max_fee {
            return Err(estimate.max_fee_per_gas);
        }
        let max_priority_fee = self
            .gas_policy
            .max_priority_fee_per_gas
            .unwrap_or(estimate.max_priority_fee_per_gas)
            .min(max_fee);
        Ok(Some((max_fee, max_priority_fee)))
    }
}

fn concat_signatures(ready: &ReadyAttestation) -> Vec<u8> {
    let mut out = Vec::new();
    for sig in &ready.signatures_ordered {
        out.extend_from_slice(&sig.signature);
    }
    out
}

fn encode_receive_message(message_bytes: &[u8], signatures: &[u8]) -> Vec<u8> {
    // ABI-encodes `(bytes, bytes)` by hand: dynamic-type head/tail layout
    // with two 32-byte offsets followed by length-prefixed, 32-byte-padded
    // data blocks, matching Solidity's standard ABI encoding.
    let mut out = Vec::with_capacity(4 + 32 * 2 + 64 + message_bytes.len() + signatures.len());
    out.extend_from_slice(&RECEIVE_MESSAGE_SELECTOR);

    let head_len = 64; // two offset words
    let message_offset = head_len;
    let message_block_len = 32 + padded_len(message_bytes.len());
    let signatures_offset = message_offset + message_block_len;

    out.extend_from_slice(&U256::from(message_offset).to_be_bytes::<32>());
    out.extend_from_slice(&U256::from(signatures_offset).to_be_bytes::<32>());
    append_dynamic_bytes(&mut out, message_bytes);
    append_dynamic_bytes(&mut out, signatures);
    out
}

fn append_dynamic_bytes(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&U256::from(data.len()).to_be_bytes::<32>());
    out.extend_from_slice(data);
    let pad = padded_len(data.len()) - data.len();
    out.extend(std::iter::repeat(0u8).take(pad));
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(32) * 32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_receive_message_with_correct_offsets() {
        let message = vec![1u8; 128];
        let sigs = vec![2u8; 65 * 5];
        let encoded = encode_receive_message(&message, &sigs);
        assert_eq!(&encoded[0..4], &RECEIVE_MESSAGE_SELECTOR);
        // first offset word should read 64 (0x40)
        let offset1 = U256::from_be_slice(&encoded[4..36]);
        assert_eq!(offset1, U256::from(64u64));
    }
}
