//! Configuration for the Substrate relay-chain adapter and submitter.

use bridge_types::config::{ConfigError, endpoints_from_env, env_or};
use bridge_types::default_required_confirmations;
use url::Url;

#[derive(Debug, Clone)]
pub struct SubstrateAdapterConfig {
    /// WebSocket RPC endpoints in failover order (spec.md §4.1).
    pub ws_urls: Vec<Url>,
    pub required_confirmations: u32,
    /// Back-scan window (in blocks) on restart with no persisted checkpoint.
    pub backscan_blocks: u64,
}

impl SubstrateAdapterConfig {
    /// Reads `SUBSTRATE_WS_URL` and `CONFIRMATIONS_REQUIRED` per spec.md
    /// §6.3.
    pub fn from_env() -> Result<Self, ConfigError> {
        let ws_urls = endpoints_from_env("SUBSTRATE_WS_URL")?
            .into_iter()
            .map(|e| e.url)
            .collect();
        let required_confirmations = env_or(
            "CONFIRMATIONS_REQUIRED",
            default_required_confirmations(bridge_types::Domain::SUBSTRATE),
        )?;
        Ok(Self {
            ws_urls,
            required_confirmations,
            backscan_blocks: 100,
        })
    }
}
