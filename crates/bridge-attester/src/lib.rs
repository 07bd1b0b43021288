//! Attestation Store, Signer dispatch, metrics, and the Attester Service
//! HTTP API (spec.md §4.3–§4.5, component C/D/part of E).
//!
//! Grounded on `src/handlers.rs`/`src/facilitator_local.rs`/`src/sig_down.rs`
//! for the axum handler shape, `State`/`IntoResponse` idiom, and graceful
//! shutdown pattern; grounded on `chainflip-io-chainflip-backend/engine/src/metrics.rs`
//! for the Prometheus registry shape (see DESIGN.md).

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod service;
pub mod signer;
pub mod store;

pub use config::AttesterConfig;
pub use metrics::Metrics;
pub use service::{AttesterService, DynAdapter, HealthSnapshot, erase_adapter};
pub use signer::{Signer, SignerError};
pub use store::{AddResult, AttestationCounts, AttestationStore, StoreError};
