//! Solana chain adapter: polls confirmed blocks for memo-tagged transfers
//! into the bridge program, waits out slot-based finality, and normalizes
//! matches into [`ObservedMessage`]s.
//!
//! Solana is source-only in this deployment (spec.md §9: `Domain::SOLANA`
//! never satisfies `is_valid_destination`), so unlike `bridge-evm` this
//! crate has no signer or submitter — only discovery.

use async_trait::async_trait;
use bridge_types::adapter::{Adapter, AdapterStatus};
use bridge_types::message::ObservedMessage;
use bridge_types::TokenRef;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcBlockConfig;
use solana_commitment_config::CommitmentConfig;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::codec::{self, MemoDecodeError};
use crate::config::SolanaAdapterConfig;
use solana_pubkey::Pubkey;
use std::str::FromStr;

const MEMO_PROGRAM_ID: &str = "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr";
/// The SPL Token program: the only program whose instructions this adapter
/// trusts for `amount`/`sender` (spec.md §6.2's memo carrier only conveys
/// `destination_domain`/`recipient`; the transfer amount must come from an
/// actual token movement, not from text).
const SPL_TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
/// SPL Token `Transfer` / `TransferChecked` instruction discriminants.
const SPL_TRANSFER: u8 = 3;
const SPL_TRANSFER_CHECKED: u8 = 12;

#[derive(Debug, thiserror::Error)]
pub enum SolanaAdapterError {
    #[error("adapter failed to start: {0}")]
    AdapterStartup(String),
    #[error(transparent)]
    MemoDecode(#[from] MemoDecodeError),
}

pub struct SolanaAdapter {
    config: SolanaAdapterConfig,
    client: Arc<RpcClient>,
    token_program_id: Pubkey,
    cancellation: CancellationToken,
    status: Arc<StatusCounters>,
}

#[derive(Default)]
struct StatusCounters {
    running: AtomicBool,
    last_source_block: AtomicU64,
    events_emitted: AtomicU64,
    errors: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl SolanaAdapter {
    pub fn connect(config: SolanaAdapterConfig) -> Result<Self, SolanaAdapterError> {
        let url = config
            .rpc_urls
            .first()
            .ok_or_else(|| SolanaAdapterError::AdapterStartup("no RPC endpoints configured".into()))?;
        let client = Arc::new(RpcClient::new_with_commitment(
            url.to_string(),
            CommitmentConfig::confirmed(),
        ));
        let token_program_id = Pubkey::from_str(SPL_TOKEN_PROGRAM_ID)
            .expect("hardcoded SPL Token program id is valid base58");
        Ok(Self {
            config,
            client,
            token_program_id,
            cancellation: CancellationToken::new(),
            status: Arc::new(StatusCounters::default()),
        })
    }

    async fn run_loop(&self, tx: mpsc::Sender<ObservedMessage>) {
        self.status.running.store(true, Ordering::SeqCst);
        let mut seen_this_session: HashSet<Vec<u8>> = HashSet::new();

        let mut last_scanned_slot = match self.client.get_slot().await {
            Ok(slot) => slot.saturating_sub(
                self.config.required_confirmations as u64 + self.config.backscan_slots,
            ),
            Err(e) => {
                self.record_error(format!("failed to read starting slot: {e}"));
                return;
            }
        };

        loop {
            if self.cancellation.is_cancelled() {
                break;
            }

            let finalized_slot = match self
                .client
                .get_slot_with_commitment(CommitmentConfig::finalized())
                .await
            {
                Ok(s) => s,
                Err(e) => {
                    self.record_error(format!("get_slot failed: {e}"));
                    self.sleep_or_cancel().await;
                    continue;
                }
            };

            let target = finalized_slot.saturating_sub(self.config.required_confirmations as u64);
            let mut slot = last_scanned_slot + 1;
            while slot <= target {
                if self.cancellation.is_cancelled() {
                    break;
                }
                match self
                    .client
                    .get_block_with_config(
                        slot,
                        RpcBlockConfig {
                            commitment: Some(CommitmentConfig::finalized()),
                            max_supported_transaction_version: Some(0),
                            ..Default::default()
                        },
                    )
                    .await
                {
                    Ok(block) => {
                        let block_time_ms =
                            block.block_time.map(|t| (t as u64) * 1000).unwrap_or(0);
                        if let Some(transactions) = block.transactions {
                            for (tx_index, tx_with_meta) in transactions.into_iter().enumerate() {
                                let Some(meta) = tx_with_meta.meta.as_ref() else {
                                    continue;
                                };
                                let logs: Vec<String> = match &meta.log_messages {
                                    solana_transaction_status::option_serializer::OptionSerializer::Some(l) => l.clone(),
                                    _ => continue,
                                };
                                // spec.md §6.2/§4.1: the memo is only a valid
                                // deposit carrier when it is paired, in the
                                // same transaction, with an instruction on
                                // the configured bridge program and an
                                // SPL-token-transfer instruction the amount
                                // and sender come from. A memo alone proves
                                // nothing.
                                let Some(memo_text) = logs.iter().find_map(|line| extract_memo_text(line)) else {
                                    continue;
                                };
                                let Some(decoded) = tx_with_meta.transaction.decode() else {
                                    continue;
                                };
                                let Some(signature) = decoded.signatures.first() else {
                                    continue;
                                };
                                let source_tx = signature.as_ref().to_vec();

                                if !seen_this_session.insert(source_tx.clone()) {
                                    continue; // duplicate discovery within this session (spec.md §4.1)
                                }

                                let carrier = match codec::decode_memo(&memo_text) {
                                    Ok(carrier) => carrier,
                                    Err(e) => {
                                        warn!(error = %e, "malformed bridge memo, skipping");
                                        self.record_error(e.to_string());
                                        continue;
                                    }
                                };

                                let account_keys = decoded.message.static_account_keys();
                                let instructions = decoded.message.instructions();

                                let paired_with_bridge_program = instructions.iter().any(|ix| {
                                    matches!(
                                        account_keys.get(ix.program_id_index as usize),
                                        Some(pid) if *pid == self.config.program_id
                                    )
                                });
                                if !paired_with_bridge_program {
                                    warn!(signature = %signature, "memo not paired with an instruction on the configured bridge program, skipping");
                                    continue;
                                }

                                let transfer = instructions.iter().find_map(|ix| {
                                    let program_id = account_keys.get(ix.program_id_index as usize)?;
                                    if *program_id != self.token_program_id {
                                        return None;
                                    }
                                    let data = &ix.data;
                                    let amount = match data.first() {
                                        Some(&SPL_TRANSFER) | Some(&SPL_TRANSFER_CHECKED) if data.len() >= 9 => {
                                            u64::from_le_bytes(data[1..9].try_into().ok()?)
                                        }
                                        _ => return None,
                                    };
                                    // Both `Transfer` and `TransferChecked`
                                    // place the authority (the depositor)
                                    // last in the instruction's account list.
                                    let authority_index = *ix.accounts.last()? as usize;
                                    let authority = account_keys.get(authority_index)?;
                                    Some((amount as u128, authority.to_bytes()))
                                });
                                let Some((amount, sender)) = transfer else {
                                    warn!(signature = %signature, "memo not paired with an SPL token transfer, skipping");
                                    continue;
                                };

                                // No native per-deposit nonce exists on
                                // Solana; derive a value unique within this
                                // block from the transaction's position,
                                // matching bridge-utxo's stand-in pattern
                                // for chains with no native nonce field.
                                let nonce = slot.wrapping_mul(1_000_000).wrapping_add(tx_index as u64);

                                let observed = codec::to_observed_message(
                                    &carrier,
                                    amount,
                                    sender,
                                    nonce,
                                    TokenRef::Native,
                                    source_tx,
                                    slot,
                                    block_time_ms,
                                    self.config.required_confirmations,
                                );
                                if tx.send(observed).await.is_ok() {
                                    self.status.events_emitted.fetch_add(1, Ordering::SeqCst);
                                }
                            }
                        }
                        self.status.last_source_block.store(slot, Ordering::SeqCst);
                    }
                    Err(e) => {
                        // A skipped slot is routine on Solana; only warn,
                        // don't count it as a transport error.
                        if !e.to_string().contains("skipped") {
                            self.record_error(format!("get_block failed at slot {slot}: {e}"));
                        }
                    }
                }
                slot += 1;
            }
            last_scanned_slot = target.max(last_scanned_slot);

            self.sleep_or_cancel().await;
        }

        self.status.running.store(false, Ordering::SeqCst);
    }

    async fn sleep_or_cancel(&self) {
        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_millis(self.config.poll_interval_ms)) => {},
            _ = self.cancellation.cancelled() => {},
        }
    }

    fn record_error(&self, message: String) {
        self.status.errors.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.status.last_error.try_lock() {
            *guard = Some(message.clone());
        }
        warn!(error = %message, "adapter transport error");
    }

    fn clone_for_task(&self) -> Arc<Self> {
        Arc::new(Self {
            config: self.config.clone(),
            client: self.client.clone(),
            token_program_id: self.token_program_id,
            cancellation: self.cancellation.clone(),
            status: self.status.clone(),
        })
    }
}

/// The SPL Memo program logs its instruction data as
/// `Program log: Memo (len N): "<text>"`; this extracts `<text>` only when
/// the enclosing instruction belongs to the memo program's log block.
fn extract_memo_text(line: &str) -> Option<String> {
    let marker = "Memo (len ";
    let start = line.find(marker)?;
    let after_marker = &line[start..];
    let quote_start = after_marker.find('"')? + start + 1;
    let quote_end = line[quote_start..].find('"')? + quote_start;
    Some(line[quote_start..quote_end].to_string())
}

#[async_trait]
impl Adapter for SolanaAdapter {
    type Error = SolanaAdapterError;

    async fn start(&self) -> Result<mpsc::Receiver<ObservedMessage>, Self::Error> {
        let (tx, rx) = mpsc::channel(1024);
        info!(program_id = %self.config.program_id, "starting Solana adapter");
        let this = self.clone_for_task();
        tokio::spawn(async move {
            this.run_loop(tx).await;
        });
        Ok(rx)
    }

    async fn stop(&self) {
        self.cancellation.cancel();
    }

    async fn status(&self) -> AdapterStatus {
        AdapterStatus {
            running: self.status.running.load(Ordering::SeqCst),
            last_source_block: self.status.last_source_block.load(Ordering::SeqCst),
            events_emitted: self.status.events_emitted.load(Ordering::SeqCst),
            errors: self.status.errors.load(Ordering::SeqCst),
            last_error: self.status.last_error.lock().await.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_memo_text_from_log_line() {
        let line = r#"Program log: Memo (len 20): "ETRID:deadbeef...""#;
        assert_eq!(
            extract_memo_text(line),
            Some("ETRID:deadbeef...".to_string())
        );
    }

    #[test]
    fn ignores_unrelated_log_lines() {
        let line = "Program log: transfer 100 lamports";
        assert_eq!(extract_memo_text(line), None);
    }
}
