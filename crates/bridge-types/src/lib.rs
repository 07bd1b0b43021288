//! Core data model shared by every chain adapter, the attester service,
//! and the relayer.
//!
//! This crate is intentionally free of I/O: it defines the wire-stable
//! types from spec.md §3 (`Domain`, `ObservedMessage`, `MessageId`,
//! `Attestation`, ...), the pure canonicalization function from spec.md
//! §4.2, the `Adapter` trait every chain-family crate implements, and the
//! configuration/error primitives the rest of the workspace builds on.
//!
//! # Modules
//!
//! - [`domain`] — the fixed chain-role tag space and per-domain finality
//!   defaults
//! - [`message`] — `ObservedMessage`, `TokenRef`, canonicalization, and
//!   `MessageId`
//! - [`attestation`] — `AttesterIdentity`, `PartialSignature`,
//!   `Attestation`, `ReadyAttestation`
//! - [`adapter`] — the `Adapter` trait and `PendingDeposit`/`AdapterStatus`
//! - [`config`] — environment-variable resolution shared by every adapter
//!   factory
//! - [`error`] — the cross-cutting error-kind taxonomy from spec.md §7

pub mod adapter;
pub mod attestation;
pub mod config;
pub mod domain;
pub mod error;
pub mod message;

pub use adapter::{Adapter, AdapterStatus, PendingDeposit};
pub use attestation::{
    Attestation, AttestationStatus, AttesterIdentity, ObservedStatus, PartialSignature,
    ReadyAttestation, SignatureScheme,
};
pub use domain::{ChainFamily, Domain, default_required_confirmations};
pub use error::{Classify, ErrorKind};
pub use message::{CanonicalizeError, MessageId, ObservedMessage, TokenRef, canonicalize};
