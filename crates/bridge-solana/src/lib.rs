//! Solana chain adapter: confirmed-block polling, slot-based finality, and
//! the `"ETRID:"`-tagged memo carrier (spec.md §4.1, §6.2).
//!
//! Solana is source-only in this deployment — it never appears as a
//! `destination_domain` (spec.md §3, `Domain::is_valid_destination`) — so
//! unlike `bridge-evm` this crate has no signer or submitter, only
//! discovery and normalization.

pub mod adapter;
pub mod codec;
pub mod config;

pub use adapter::{SolanaAdapter, SolanaAdapterError};
pub use codec::{DecodedCarrier, MemoDecodeError, decode_memo, to_observed_message};
pub use config::SolanaAdapterConfig;
