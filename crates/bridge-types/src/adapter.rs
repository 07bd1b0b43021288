//! The `Adapter` trait every chain-family crate implements, and the two
//! narrow sub-interfaces (`Source`, `Parser`) the design notes in
//! spec.md §9 call for instead of one monolithic class per chain.
//!
//! `Source` is how an adapter gets raw, chain-native events (by
//! subscription or by polling); `Parser` is how a raw event becomes an
//! [`ObservedMessage`]. An `Adapter` composes one `Source` with one
//! `Parser` plus the finality-wait bookkeeping common to every chain
//! family, so the duplicated boilerplate the source material had per chain
//! (one monitor class each) collapses into a single generic driver living
//! in each chain crate's `adapter.rs`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::message::ObservedMessage;

/// A deposit an adapter has discovered but not yet promoted: it is held
/// locally until `current_confirmations >= required(source_domain)`
/// (spec.md §3, "PendingDeposit").
#[derive(Debug, Clone)]
pub struct PendingDeposit {
    pub message: ObservedMessage,
    pub source_block: u64,
    pub current_confirmations: u32,
}

/// Point-in-time operational snapshot of one adapter (spec.md §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterStatus {
    pub running: bool,
    pub last_source_block: u64,
    pub events_emitted: u64,
    pub errors: u64,
    pub last_error: Option<String>,
}

impl Default for AdapterStatus {
    fn default() -> Self {
        AdapterStatus {
            running: false,
            last_source_block: 0,
            events_emitted: 0,
            errors: 0,
            last_error: None,
        }
    }
}

/// Operations every chain adapter exposes uniformly, regardless of chain
/// family (spec.md §4.1).
///
/// Delivery of [`ObservedMessage`] values is at-least-once: downstream
/// (the attester's `ensure`/`add_signature` path) must dedupe by
/// `MessageId`. `start` is idempotent; `stop` must not block indefinitely
/// and cancels in-flight finality checks.
#[async_trait]
pub trait Adapter: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Begins observation, returning the receiving half of the delivery
    /// channel. Fails with a configuration/transport error if the RPC
    /// endpoint is unreachable after the configured retry budget.
    async fn start(&self) -> Result<mpsc::Receiver<ObservedMessage>, Self::Error>;

    /// Ceases observation. Cancels in-flight finality checks; does not
    /// block indefinitely.
    async fn stop(&self);

    /// Current operational status.
    async fn status(&self) -> AdapterStatus;
}
