//! Bitcoin, TRON, XRPL, Cardano, and Stellar adapters (spec.md §4.1): five
//! polling-only, source-only chain families that share one carrier-payload
//! format (`carrier.rs`) and one config shape (`config.rs`), grounded on
//! `chainflip-io-chainflip-backend/engine/src/btc` for the poll/finality
//! shape and on `other_examples` bridge memo-carrier parsers for the
//! OP_RETURN/metadata/memo convention (see DESIGN.md).
//!
//! None of these five ever appears as a `destination_domain`
//! (`Domain::is_valid_destination` only accepts EVM-family and Substrate),
//! so this crate, like `bridge-solana`, has no signer or submitter.

pub mod bitcoin;
pub mod cardano;
pub mod carrier;
pub mod config;
pub mod stellar;
pub mod tron;
pub mod xrpl;

pub use bitcoin::{BitcoinAdapter, BitcoinAdapterError};
pub use cardano::{CardanoAdapter, CardanoAdapterError};
pub use carrier::{CarrierDecodeError, CarrierPayload, decode_carrier};
pub use config::LedgerAdapterConfig;
pub use stellar::{StellarAdapter, StellarAdapterError};
pub use tron::{TronAdapter, TronAdapterError};
pub use xrpl::{XrplAdapter, XrplAdapterError};
