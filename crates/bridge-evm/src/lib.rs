//! EVM-family chain support: CCTP-style message decoding, the chain
//! adapter, the secp256k1 attester signer, and the destination submitter.
//!
//! Covers every chain tagged [`bridge_types::domain::ChainFamily::Evm`]
//! (Ethereum, Polygon, Arbitrum, BNB, Base) — one instance of each type
//! here per configured chain, not one impl per chain.

pub mod adapter;
pub mod codec;
pub mod config;
pub mod signer;
pub mod submitter;

pub use adapter::{EvmAdapter, EvmAdapterError};
pub use codec::{CctpDecodeError, CctpMessage, decode_message, to_observed_message};
pub use config::Eip155AdapterConfig;
pub use signer::{EcdsaSigner, EcdsaSignerError};
pub use submitter::{EvmSubmitter, SubmissionState, SubmitError};
