//! Configuration for the Solana adapter instance.

use bridge_types::config::{ConfigError, endpoints_from_env, env_or};
use bridge_types::default_required_confirmations;
use solana_pubkey::Pubkey;
use std::str::FromStr;
use url::Url;

#[derive(Debug, Clone)]
pub struct SolanaAdapterConfig {
    pub rpc_urls: Vec<Url>,
    /// The bridge program to watch memo-tagged transfers into.
    pub program_id: Pubkey,
    pub required_confirmations: u32,
    pub poll_interval_ms: u64,
    /// Back-scan window (in slots) on restart with no persisted checkpoint.
    pub backscan_slots: u64,
}

impl SolanaAdapterConfig {
    /// Reads `SOLANA_RPC_URL`, `BRIDGE_PROGRAM_ID`, `CONFIRMATIONS_REQUIRED`,
    /// and `POLL_INTERVAL_MS` per spec.md §6.3.
    pub fn from_env() -> Result<Self, ConfigError> {
        let rpc_urls = endpoints_from_env("SOLANA_RPC_URL")?
            .into_iter()
            .map(|e| e.url)
            .collect();
        let program_id_raw = bridge_types::config::require_env("BRIDGE_PROGRAM_ID")?;
        let program_id = Pubkey::from_str(&program_id_raw)
            .map_err(|_| ConfigError::InvalidValue("BRIDGE_PROGRAM_ID".into(), program_id_raw))?;
        let required_confirmations = env_or(
            "CONFIRMATIONS_REQUIRED",
            default_required_confirmations(bridge_types::Domain::SOLANA),
        )?;
        let poll_interval_ms = env_or("POLL_INTERVAL_MS", 8_000u64)?;

        Ok(Self {
            rpc_urls,
            program_id,
            required_confirmations,
            poll_interval_ms,
            backscan_slots: 500,
        })
    }
}
