//! Configuration shared by the five ledger-family adapters. Each chain
//! reads its own `<PREFIX>_RPC_URL` env var (spec.md §6.3) but otherwise
//! shares the same shape, since all five are polling-only, source-only
//! REST/JSON-RPC clients.

use bridge_types::config::{ConfigError, endpoints_from_env, env_or};
use bridge_types::{Domain, default_required_confirmations};
use url::Url;

#[derive(Debug, Clone)]
pub struct LedgerAdapterConfig {
    pub domain: Domain,
    pub rpc_urls: Vec<Url>,
    pub required_confirmations: u32,
    pub poll_interval_ms: u64,
    /// Back-scan window (in blocks/ledgers) on restart with no persisted
    /// checkpoint.
    pub backscan_blocks: u64,
    /// Optional bearer token for hosted indexer APIs (Blockfrost's
    /// `project_id` header, a Horizon auth proxy, TronGrid's `TRON-PRO-API-KEY`).
    pub api_key: Option<String>,
}

impl LedgerAdapterConfig {
    /// Reads `<prefix>_RPC_URL`, `<prefix>_API_KEY` (optional), and the
    /// shared `CONFIRMATIONS_REQUIRED`/`POLL_INTERVAL_MS` overrides for one
    /// ledger-family chain.
    pub fn from_env(prefix: &str, domain: Domain) -> Result<Self, ConfigError> {
        let rpc_urls = endpoints_from_env(&format!("{prefix}_RPC_URL"))?
            .into_iter()
            .map(|e| e.url)
            .collect();
        let required_confirmations =
            env_or("CONFIRMATIONS_REQUIRED", default_required_confirmations(domain))?;
        let poll_interval_ms = env_or("POLL_INTERVAL_MS", 15_000u64)?;
        let api_key = std::env::var(format!("{prefix}_API_KEY")).ok();

        Ok(Self {
            domain,
            rpc_urls,
            required_confirmations,
            poll_interval_ms,
            backscan_blocks: 50,
            api_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn reads_prefixed_rpc_url() {
        let _g = ENV_LOCK.lock().unwrap();
        unsafe {
            std::env::set_var("BITCOIN_RPC_URL", "https://btc.example");
        }
        let cfg = LedgerAdapterConfig::from_env("BITCOIN", Domain::BITCOIN).unwrap();
        assert_eq!(cfg.rpc_urls.len(), 1);
        assert_eq!(cfg.required_confirmations, 6);
        unsafe {
            std::env::remove_var("BITCOIN_RPC_URL");
        }
    }
}
