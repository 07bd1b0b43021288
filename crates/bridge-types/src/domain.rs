//! The fixed domain tag space identifying a chain's role in the bridge.
//!
//! Domains are stable across the fleet: every attester and every on-chain
//! verifier must agree on the same integer for the same chain. The set is
//! not open for extension at runtime — new chains are added here, not
//! discovered from configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer tag identifying a chain's role in the system.
///
/// Wraps a bare `u32` so call sites can't accidentally pass a nonce, amount,
/// or block number where a domain is expected, and so [`Domain::family`]
/// can centralize the signing-scheme / finality-rule dispatch that would
/// otherwise be repeated as a `match` in every adapter and in the signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(pub u32);

impl Domain {
    pub const EVM_ETHEREUM: Domain = Domain(0);
    pub const SOLANA: Domain = Domain(1);
    pub const SUBSTRATE: Domain = Domain(2);
    pub const POLYGON: Domain = Domain(3);
    pub const ARBITRUM: Domain = Domain(4);
    pub const BNB: Domain = Domain(5);
    pub const BASE: Domain = Domain(6);
    pub const BITCOIN: Domain = Domain(7);
    pub const TRON: Domain = Domain(8);
    pub const XRPL: Domain = Domain(9);
    pub const CARDANO: Domain = Domain(10);
    pub const STELLAR: Domain = Domain(11);

    /// Classifies this domain into the family that determines its signing
    /// scheme, finality rule, and message-carrier encoding.
    pub fn family(self) -> ChainFamily {
        match self {
            Domain::EVM_ETHEREUM
            | Domain::POLYGON
            | Domain::ARBITRUM
            | Domain::BNB
            | Domain::BASE => ChainFamily::Evm,
            Domain::SUBSTRATE => ChainFamily::Substrate,
            Domain::SOLANA => ChainFamily::Solana,
            Domain::BITCOIN => ChainFamily::Bitcoin,
            Domain::TRON => ChainFamily::Tron,
            Domain::XRPL => ChainFamily::Xrpl,
            Domain::CARDANO => ChainFamily::Cardano,
            Domain::STELLAR => ChainFamily::Stellar,
            _ => ChainFamily::Unknown,
        }
    }

    /// Whether this domain can appear as a `destination_domain`.
    ///
    /// Only EVM-family chains and the Substrate relay chain host a
    /// message-transmitter verifier in this deployment; every other domain
    /// is source-only (see `Signer::sign` in `bridge-attester`).
    pub fn is_valid_destination(self) -> bool {
        matches!(self.family(), ChainFamily::Evm | ChainFamily::Substrate)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Domain {
    fn from(value: u32) -> Self {
        Domain(value)
    }
}

/// The chain family a [`Domain`] belongs to.
///
/// Drives signing-scheme selection (spec.md §4.3) and the discovery
/// strategy each adapter crate implements (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFamily {
    Evm,
    Substrate,
    Solana,
    Bitcoin,
    Tron,
    Xrpl,
    Cardano,
    Stellar,
    Unknown,
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChainFamily::Evm => "evm",
            ChainFamily::Substrate => "substrate",
            ChainFamily::Solana => "solana",
            ChainFamily::Bitcoin => "bitcoin",
            ChainFamily::Tron => "tron",
            ChainFamily::Xrpl => "xrpl",
            ChainFamily::Cardano => "cardano",
            ChainFamily::Stellar => "stellar",
            ChainFamily::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Default finality depth for a source domain, per spec.md §4.1's table.
///
/// Adapters may override this with `CONFIRMATIONS_REQUIRED` (spec.md §6.3);
/// this function supplies the fallback every adapter factory reads from
/// when no override is configured.
pub fn default_required_confirmations(domain: Domain) -> u32 {
    match domain {
        Domain::EVM_ETHEREUM => 12,
        Domain::POLYGON => 128,
        Domain::ARBITRUM => 20,
        Domain::BNB => 15,
        Domain::BASE => 10,
        Domain::SOLANA => 31,
        Domain::SUBSTRATE => 2,
        Domain::BITCOIN => 6,
        Domain::TRON => 19,
        Domain::XRPL => 1,
        Domain::CARDANO => 15,
        Domain::STELLAR => 3,
        _ => 12,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evm_family_covers_all_evm_chains() {
        for d in [
            Domain::EVM_ETHEREUM,
            Domain::POLYGON,
            Domain::ARBITRUM,
            Domain::BNB,
            Domain::BASE,
        ] {
            assert_eq!(d.family(), ChainFamily::Evm);
            assert!(d.is_valid_destination());
        }
    }

    #[test]
    fn solana_is_source_only() {
        assert_eq!(Domain::SOLANA.family(), ChainFamily::Solana);
        assert!(!Domain::SOLANA.is_valid_destination());
    }

    #[test]
    fn substrate_is_a_valid_destination() {
        assert!(Domain::SUBSTRATE.is_valid_destination());
    }

    #[test]
    fn confirmations_table_matches_spec() {
        assert_eq!(default_required_confirmations(Domain::EVM_ETHEREUM), 12);
        assert_eq!(default_required_confirmations(Domain::SOLANA), 31);
        assert_eq!(default_required_confirmations(Domain::SUBSTRATE), 2);
        assert_eq!(default_required_confirmations(Domain::BITCOIN), 6);
        assert_eq!(default_required_confirmations(Domain::TRON), 19);
        assert_eq!(default_required_confirmations(Domain::XRPL), 1);
        assert_eq!(default_required_confirmations(Domain::CARDANO), 15);
        assert_eq!(default_required_confirmations(Domain::STELLAR), 3);
    }
}
