//! Substrate relay-chain adapter, signer, and submitter (spec.md §4, chain
//! family `Substrate`). No teacher equivalent exists for this chain family;
//! grounded on `examples/cennznet-cennznet` and
//! `examples/futureversecom-trn-seed`'s `sp-core`/SCALE usage and
//! `chainflip-io-chainflip-backend/engine/src/state_chain` for the
//! block-subscription shape (see DESIGN.md).

pub mod adapter;
pub mod codec;
pub mod config;
pub mod signer;
pub mod submitter;

pub use adapter::{SubstrateAdapter, SubstrateAdapterError};
pub use codec::{BurnMessageSent, ScaleDecodeError, decode_burn_message_sent, to_observed_message};
pub use config::SubstrateAdapterConfig;
pub use signer::{Sr25519Signer, Sr25519SignerError};
pub use submitter::{RelayerAccount, SubmissionState, SubmitError, SubstrateSubmitter};
