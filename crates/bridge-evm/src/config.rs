//! Configuration for one EVM-family adapter instance.

use alloy_primitives::Address;
use bridge_types::config::{ConfigError, endpoints_from_env, env_or};
use bridge_types::{Domain, default_required_confirmations};
use url::Url;

/// Configuration for observing one EVM-family chain and, for the relayer,
/// submitting to its message-transmitter contract.
#[derive(Debug, Clone)]
pub struct Eip155AdapterConfig {
    pub source_domain: Domain,
    /// RPC endpoints in failover order (spec.md §4.1).
    pub rpc_urls: Vec<Url>,
    /// Optional WebSocket endpoint for push-based log subscription;
    /// falls back to polling when absent (spec.md §4.1).
    pub ws_url: Option<Url>,
    pub bridge_address: Address,
    pub required_confirmations: u32,
    /// Polling interval used when no `ws_url` is configured.
    pub poll_interval_ms: u64,
    /// Back-scan window on restart with no persisted checkpoint
    /// (spec.md §4.1, default 100 blocks).
    pub backscan_blocks: u64,
}

impl Eip155AdapterConfig {
    /// Loads configuration for `source_domain` from the environment,
    /// using the `<CHAIN>_RPC_URL`/`<CHAIN>_WS_URL`/`TOKEN_MESSENGER_ADDRESS`/
    /// `CONFIRMATIONS_REQUIRED`/`POLL_INTERVAL_MS` variables from spec.md §6.3.
    /// `chain_env_prefix` is e.g. `"ETH"`, `"POLYGON"`, `"ARBITRUM"`, `"BNB"`,
    /// `"BASE"`.
    pub fn from_env(source_domain: Domain, chain_env_prefix: &str) -> Result<Self, ConfigError> {
        let rpc_var = format!("{chain_env_prefix}_RPC_URL");
        let ws_var = format!("{chain_env_prefix}_WS_URL");
        let rpc_urls = endpoints_from_env(&rpc_var)?
            .into_iter()
            .map(|e| e.url)
            .collect();
        let ws_url = bridge_types::config::endpoints_from_env(&ws_var)
            .ok()
            .and_then(|v| v.into_iter().next())
            .map(|e| e.url);
        let bridge_address_raw = bridge_types::config::require_env("TOKEN_MESSENGER_ADDRESS")?;
        let bridge_address: Address = bridge_address_raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue("TOKEN_MESSENGER_ADDRESS".into(), bridge_address_raw))?;
        let required_confirmations = env_or(
            "CONFIRMATIONS_REQUIRED",
            default_required_confirmations(source_domain),
        )?;
        let poll_interval_ms = env_or("POLL_INTERVAL_MS", 12_000u64)?;

        Ok(Self {
            source_domain,
            rpc_urls,
            ws_url,
            bridge_address,
            required_confirmations,
            poll_interval_ms,
            backscan_blocks: 100,
        })
    }
}
