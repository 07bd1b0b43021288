//! Environment-variable configuration for one Attester Service process
//! (spec.md §6.3).
//!
//! **Open design choice** (recorded in DESIGN.md): spec.md §6.3 names a
//! single `ATTESTER_PRIVATE_KEY`/`ATTESTER_ADDRESS` pair, but one attester
//! must be able to sign for *either* an EVM or the Substrate destination
//! depending on which message it is asked to sign (spec.md §4.3), and the
//! two schemes use unrelated curves. This config therefore reads two
//! independent, optionally-absent key pairs: `ATTESTER_PRIVATE_KEY`/
//! `ATTESTER_ADDRESS` for secp256k1 (as spec.md names them) and
//! `ATTESTER_SR25519_SEED`/`ATTESTER_SR25519_ADDRESS` for Sr25519. An
//! attester that only ever signs for one family may configure just that
//! pair; `Signer::sign` fails with a clear error if the family it is asked
//! to sign for has no key loaded.

use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use alloy_primitives::Address;
use bridge_types::config::{ConfigError, env_or, require_env, require_env_hex};

pub struct AttesterConfig {
    pub attester_id: u8,
    pub ecdsa_key: Option<Vec<u8>>,
    pub ecdsa_address: Option<Address>,
    pub sr25519_seed: Option<[u8; 32]>,
    pub sr25519_address: Option<String>,
    pub min_signatures: usize,
    pub total_attesters: usize,
    pub host: IpAddr,
    pub port: u16,
    pub sweep_interval_ms: u64,
}

impl AttesterConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let attester_id: u8 = env_or("ATTESTER_ID", 1u8)?;
        let min_signatures: usize = env_or("MIN_SIGNATURES", 5usize)?;
        let total_attesters: usize = env_or("TOTAL_ATTESTERS", 9usize)?;
        let port: u16 = env_or("PORT", 8085u16)?;
        let host: IpAddr = env_or("HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let sweep_interval_ms: u64 = env_or("SWEEP_INTERVAL_MS", 60_000u64)?;

        let ecdsa_key = if std::env::var("ATTESTER_PRIVATE_KEY").is_ok() {
            Some(require_env_hex("ATTESTER_PRIVATE_KEY")?)
        } else {
            None
        };
        let ecdsa_address = match &ecdsa_key {
            Some(_) => {
                let raw = require_env("ATTESTER_ADDRESS")?;
                Some(
                    Address::from_str(&raw)
                        .map_err(|e| ConfigError::InvalidValue("ATTESTER_ADDRESS".into(), e.to_string()))?,
                )
            }
            None => None,
        };

        let sr25519_seed = if std::env::var("ATTESTER_SR25519_SEED").is_ok() {
            let bytes = require_env_hex("ATTESTER_SR25519_SEED")?;
            let seed: [u8; 32] = bytes.try_into().map_err(|_| {
                ConfigError::InvalidValue("ATTESTER_SR25519_SEED".into(), "expected 32 bytes".into())
            })?;
            Some(seed)
        } else {
            None
        };
        let sr25519_address = match &sr25519_seed {
            Some(_) => Some(require_env("ATTESTER_SR25519_ADDRESS")?),
            None => None,
        };

        Ok(Self {
            attester_id,
            ecdsa_key,
            ecdsa_address,
            sr25519_seed,
            sr25519_address,
            min_signatures,
            total_attesters,
            host,
            port,
            sweep_interval_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_apply_with_no_key_material_configured() {
        let _g = ENV_LOCK.lock().unwrap();
        for var in [
            "ATTESTER_PRIVATE_KEY",
            "ATTESTER_ADDRESS",
            "ATTESTER_SR25519_SEED",
            "ATTESTER_SR25519_ADDRESS",
            "ATTESTER_ID",
            "MIN_SIGNATURES",
            "TOTAL_ATTESTERS",
        ] {
            unsafe {
                std::env::remove_var(var);
            }
        }
        let config = AttesterConfig::load().unwrap();
        assert_eq!(config.attester_id, 1);
        assert_eq!(config.min_signatures, 5);
        assert_eq!(config.total_attesters, 9);
        assert!(config.ecdsa_key.is_none());
        assert!(config.sr25519_seed.is_none());
    }
}
