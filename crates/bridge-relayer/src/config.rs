//! Environment-variable configuration for the relayer process (spec.md
//! §6.3).
//!
//! **Open design choice** (recorded in DESIGN.md): spec.md §6.3 names
//! `ATTESTER_PRIVATE_KEY`/`ATTESTER_ADDRESS` for an attester's signing
//! key, but the relayer signs and sends its own destination-chain
//! transactions from "a single relayer account" (spec.md §4.7) distinct
//! from any attester identity. This config therefore reads the analogous
//! `RELAYER_PRIVATE_KEY`/`RELAYER_ADDRESS` (EVM) and
//! `RELAYER_SR25519_SEED`/`RELAYER_SR25519_ADDRESS` (Substrate) pair,
//! following the same naming convention. Likewise, spec.md's env var table
//! has no variable for the relayer's list of attester API base URLs to
//! poll (spec.md §4.6); this reads `ATTESTER_URLS` as a comma-separated
//! list, following the same comma-separated-for-failover convention
//! spec.md §6.3 already uses for `<CHAIN>_RPC_URL`.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use bridge_types::config::{ConfigError, env_or, require_env, require_env_hex};
use url::Url;

pub struct RelayerConfig {
    pub attester_urls: Vec<Url>,
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub dedupe_capacity: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub host: IpAddr,
    pub port: u16,

    pub evm_private_key: Option<Vec<u8>>,
    pub evm_address: Option<String>,
    pub gas_limit: Option<u64>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,

    pub substrate_sr25519_seed: Option<[u8; 32]>,
}

impl RelayerConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let attester_urls_raw = require_env("ATTESTER_URLS")?;
        let attester_urls = attester_urls_raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Url::parse(s)
                    .map_err(|e| ConfigError::InvalidUrl("ATTESTER_URLS".into(), s.to_string(), e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if attester_urls.is_empty() {
            return Err(ConfigError::InvalidValue(
                "ATTESTER_URLS".into(),
                "must list at least one attester base URL".into(),
            ));
        }

        let poll_interval_ms: u64 = env_or("POLL_INTERVAL_MS", 30_000u64)?;
        let fetch_timeout_ms: u64 = env_or("FETCH_TIMEOUT_MS", 10_000u64)?;
        let dedupe_capacity: usize = env_or("DEDUPE_CAPACITY", 10_000usize)?;
        let max_retries: u32 = env_or("MAX_RETRIES", 3u32)?;
        let retry_delay_ms: u64 = env_or("RETRY_DELAY_MS", 60_000u64)?;
        let host: IpAddr = env_or("HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let port: u16 = env_or("PORT", 8090u16)?;

        let evm_private_key = if std::env::var("RELAYER_PRIVATE_KEY").is_ok() {
            Some(require_env_hex("RELAYER_PRIVATE_KEY")?)
        } else {
            None
        };
        let evm_address = match &evm_private_key {
            Some(_) => Some(require_env("RELAYER_ADDRESS")?),
            None => None,
        };
        let gas_limit = std::env::var("GAS_LIMIT").ok().and_then(|v| v.parse().ok());
        let max_fee_per_gas = std::env::var("MAX_FEE_PER_GAS").ok().and_then(|v| v.parse().ok());
        let max_priority_fee_per_gas = std::env::var("MAX_PRIORITY_FEE_PER_GAS")
            .ok()
            .and_then(|v| v.parse().ok());

        let substrate_sr25519_seed = if std::env::var("RELAYER_SR25519_SEED").is_ok() {
            let bytes = require_env_hex("RELAYER_SR25519_SEED")?;
            let seed: [u8; 32] = bytes.try_into().map_err(|_| {
                ConfigError::InvalidValue("RELAYER_SR25519_SEED".into(), "expected 32 bytes".into())
            })?;
            Some(seed)
        } else {
            None
        };

        Ok(Self {
            attester_urls,
            poll_interval: Duration::from_millis(poll_interval_ms),
            fetch_timeout: Duration::from_millis(fetch_timeout_ms),
            dedupe_capacity,
            max_retries,
            retry_delay: Duration::from_millis(retry_delay_ms),
            host,
            port,
            evm_private_key,
            evm_address,
            gas_limit,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            substrate_sr25519_seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn requires_at_least_one_attester_url() {
        let _g = ENV_LOCK.lock().unwrap();
        unsafe {
            std::env::remove_var("ATTESTER_URLS");
        }
        assert!(RelayerConfig::load().is_err());
    }

    #[test]
    fn loads_defaults_with_attester_urls_set() {
        let _g = ENV_LOCK.lock().unwrap();
        unsafe {
            std::env::set_var("ATTESTER_URLS", "http://localhost:8085,http://localhost:8086");
            std::env::remove_var("RELAYER_PRIVATE_KEY");
        }
        let config = RelayerConfig::load().unwrap();
        assert_eq!(config.attester_urls.len(), 2);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        unsafe {
            std::env::remove_var("ATTESTER_URLS");
        }
    }
}
