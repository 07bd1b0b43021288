//! TRON adapter: polls a TronGrid-compatible HTTP API for new blocks,
//! scans `TransferContract` transactions for the carrier payload in the
//! transaction's `data` note field, and waits out the 19-confirmation
//! super-representative finality rule (spec.md §4.1).

use async_trait::async_trait;
use bridge_types::adapter::{Adapter, AdapterStatus};
use bridge_types::message::ObservedMessage;
use bridge_types::TokenRef;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::carrier::{self, CarrierDecodeError};
use crate::config::LedgerAdapterConfig;

#[derive(Debug, thiserror::Error)]
pub enum TronAdapterError {
    #[error("adapter failed to start: {0}")]
    AdapterStartup(String),
    #[error(transparent)]
    Carrier(#[from] CarrierDecodeError),
}

pub struct TronAdapter {
    config: LedgerAdapterConfig,
    http: reqwest::Client,
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

impl TronAdapter {
    pub fn connect(config: LedgerAdapterConfig) -> Result<Self, TronAdapterError> {
        if config.rpc_urls.is_empty() {
            return Err(TronAdapterError::AdapterStartup("no RPC endpoints configured".into()));
        }
        Ok(Self {
            config,
            http: reqwest::Client::new(),
            cancellation: CancellationToken::new(),
            status: Arc::new(StatusCounters::default()),
        })
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let url = self.config.rpc_urls[0].join(path).unwrap_or_else(|_| self.config.rpc_urls[0].clone());
        let mut req = self.http.get(url);
        if let Some(key) = &self.config.api_key {
            req = req.header("TRON-PRO-API-KEY", key);
        }
        req
    }

    async fn run_loop(&self, tx: mpsc::Sender<ObservedMessage>) {
        self.status.running.store(true, Ordering::SeqCst);
        let mut seen_this_session: HashSet<Vec<u8>> = HashSet::new();

        let mut last_scanned = match self.latest_block_number().await {
            Ok(n) => n.saturating_sub(self.config.backscan_blocks),
            Err(e) => {
                self.record_error(format!("failed to read latest block: {e}"));
                return;
            }
        };

        loop {
            if self.cancellation.is_cancelled() {
                break;
            }

            let tip = match self.latest_block_number().await {
                Ok(n) => n,
                Err(e) => {
                    self.record_error(format!("failed to read latest block: {e}"));
                    self.sleep_or_cancel().await;
                    continue;
                }
            };
            let target = tip.saturating_sub(self.config.required_confirmations as u64);

            let mut number = last_scanned + 1;
            while number <= target {
                if self.cancellation.is_cancelled() {
                    break;
                }
                match self.scan_block(number, &tx, &mut seen_this_session).await {
                    Ok(()) => self.status.last_source_block.store(number, Ordering::SeqCst),
                    Err(e) => self.record_error(format!("block {number} scan failed: {e}")),
                }
                number += 1;
            }
            last_scanned = target.max(last_scanned);

            self.sleep_or_cancel().await;
        }

        self.status.running.store(false, Ordering::SeqCst);
    }

    async fn latest_block_number(&self) -> Result<u64, String> {
        let body: Value = self
            .request("wallet/getnowblock")
            .send()
            .await
            .map_err(|e| e.to_string())?
            .json()
            .await
            .map_err(|e| e.to_string())?;
        body.pointer("/block_header/raw_data/number")
            .and_then(Value::as_u64)
            .ok_or_else(|| "missing block number".to_string())
    }

    async fn scan_block(
        &self,
        number: u64,
        tx: &mpsc::Sender<ObservedMessage>,
        seen_this_session: &mut HashSet<Vec<u8>>,
    ) -> Result<(), String> {
        let url = self
            .config
            .rpc_urls[0]
            .join(&format!("wallet/getblockbynum?num={number}"))
            .map_err(|e| e.to_string())?;
        let mut req = self.http.get(url);
        if let Some(key) = &self.config.api_key {
            req = req.header("TRON-PRO-API-KEY", key);
        }
        let body: Value = req.send().await.map_err(|e| e.to_string())?.json().await.map_err(|e| e.to_string())?;
        let block_time_ms = body
            .pointer("/block_header/raw_data/timestamp")
            .and_then(Value::as_u64)
            .unwrap_or(0);

        let Some(transactions) = body.get("transactions").and_then(Value::as_array) else {
            return Ok(());
        };
        for txn in transactions {
            let Some(txid_hex) = txn.get("txID").and_then(Value::as_str) else { continue };
            let Some(contract) = txn.pointer("/raw_data/contract/0") else { continue };
            if contract.get("type").and_then(Value::as_str) != Some("TransferContract") {
                continue;
            }
            let Some(value) = contract.pointer("/parameter/value") else { continue };
            let amount = value.get("amount").and_then(Value::as_u64).unwrap_or(0) as u128;
            let Some(note_hex) = txn.pointer("/raw_data/data").and_then(Value::as_str) else { continue };
            let Ok(txid) = hex::decode(txid_hex) else { continue };
            if !seen_this_session.insert(txid.clone()) {
                continue; // duplicate discovery within this session (spec.md §4.1)
            }
            let Ok(note) = hex::decode(note_hex) else {
                warn!("TRON transaction note is not valid hex, skipping");
                continue;
            };
            match carrier::decode_carrier(&note) {
                Ok(decoded) => {
                    let observed = ObservedMessage {
                        source_domain: self.config.domain,
                        destination_domain: decoded.destination_domain,
                        nonce: number,
                        sender: [0u8; 32], // no identified sender field on this carrier (spec.md §4.1 normalization contract)
                        recipient: decoded.recipient,
                        amount,
                        token: TokenRef::Native,
                        source_tx: txid,
                        source_block: number,
                        source_timestamp_ms: block_time_ms,
                        confirmations_seen: self.config.required_confirmations,
                    };
                    if tx.send(observed).await.is_ok() {
                        self.status.events_emitted.fetch_add(1, Ordering::SeqCst);
                    }
                }
                Err(e) => warn!(error = %e, "malformed TRON carrier note, skipping"),
            }
        }
        Ok(())
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
            http: self.http.clone(),
            cancellation: self.cancellation.clone(),
            status: self.status.clone(),
        })
    }
}

#[async_trait]
impl Adapter for TronAdapter {
    type Error = TronAdapterError;

    async fn start(&self) -> Result<mpsc::Receiver<ObservedMessage>, Self::Error> {
        let (tx, rx) = mpsc::channel(1024);
        info!("starting TRON adapter");
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
