//! Destination Submitter dispatch (spec.md §4.7): routes a
//! [`ReadyAttestation`] to the submitter for its `destination_domain`,
//! enforces "at most one in-flight submission per `message_id`", and
//! notifies the source attesters best-effort once a submission reaches a
//! terminal state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bridge_evm::EvmSubmitter;
use bridge_substrate::SubstrateSubmitter;
use bridge_types::attestation::ReadyAttestation;
use bridge_types::domain::Domain;
use bridge_types::message::MessageId;
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;

use crate::metrics::RelayerMetrics;

/// Terminal/in-progress state of one destination submission, unified
/// across chain families (spec.md §4.7's state machine is the same
/// regardless of destination).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Queued,
    InFlight,
    Confirmed,
    Failed,
    Rejected,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("message_id {0} already has an in-flight submission")]
    AlreadyInFlight(MessageId),
    #[error("no submitter configured for destination_domain {0:?}")]
    NoSubmitter(Domain),
    #[error("submission exhausted its retry budget: {0}")]
    RetriesExhausted(String),
}

/// One concrete per-chain-family submitter, erased behind a common
/// `submit` entry point so the dispatcher can hold EVM and Substrate
/// destinations side by side (mirrors `bridge_attester::DynAdapter`'s
/// erasure of `Adapter` across chain families).
pub enum Destination {
    Evm(EvmSubmitter),
    Substrate(SubstrateSubmitter),
}

impl Destination {
    async fn submit(&self, ready: &ReadyAttestation) -> Result<SubmissionState, String> {
        match self {
            Destination::Evm(submitter) => submitter
                .submit(ready)
                .await
                .map(translate_evm_state)
                .map_err(|e| e.to_string()),
            Destination::Substrate(submitter) => submitter
                .submit(ready)
                .await
                .map(translate_substrate_state)
                .map_err(|e| e.to_string()),
        }
    }
}

fn translate_evm_state(state: bridge_evm::SubmissionState) -> SubmissionState {
    match state {
        bridge_evm::SubmissionState::Queued => SubmissionState::Queued,
        bridge_evm::SubmissionState::InFlight => SubmissionState::InFlight,
        bridge_evm::SubmissionState::Confirmed => SubmissionState::Confirmed,
        bridge_evm::SubmissionState::Failed => SubmissionState::Failed,
        bridge_evm::SubmissionState::Rejected => SubmissionState::Rejected,
    }
}

fn translate_substrate_state(state: bridge_substrate::SubmissionState) -> SubmissionState {
    match state {
        bridge_substrate::SubmissionState::Queued => SubmissionState::Queued,
        bridge_substrate::SubmissionState::InFlight => SubmissionState::InFlight,
        bridge_substrate::SubmissionState::Confirmed => SubmissionState::Confirmed,
        bridge_substrate::SubmissionState::Failed => SubmissionState::Failed,
        bridge_substrate::SubmissionState::Rejected => SubmissionState::Rejected,
    }
}

/// Dispatches ready attestations to the destination submitter keyed by
/// `destination_domain`, enforcing the at-most-one-in-flight invariant and
/// driving the best-effort `mark_relayed` notification back to every
/// configured attester source (spec.md §4.7).
pub struct RelayDispatcher {
    destinations: HashMap<Domain, Destination>,
    in_flight: Mutex<HashSet<MessageId>>,
    terminal: Mutex<HashMap<MessageId, SubmissionState>>,
    http: reqwest::Client,
    attester_sources: Vec<Url>,
    metrics: Arc<RelayerMetrics>,
}

impl RelayDispatcher {
    pub fn new(
        destinations: HashMap<Domain, Destination>,
        attester_sources: Vec<Url>,
        metrics: Arc<RelayerMetrics>,
    ) -> Self {
        Self {
            destinations,
            in_flight: Mutex::new(HashSet::new()),
            terminal: Mutex::new(HashMap::new()),
            http: reqwest::Client::new(),
            attester_sources,
            metrics,
        }
    }

    /// Dispatches one ready attestation. Returns
    /// [`DispatchError::AlreadyInFlight`] rather than submitting twice
    /// concurrently for the same `message_id` (spec.md §4.7 invariant).
    pub async fn dispatch(&self, ready: ReadyAttestation) -> Result<SubmissionState, DispatchError> {
        {
            let mut terminal = self.terminal.lock().await;
            if matches!(
                terminal.get(&ready.message_id),
                Some(SubmissionState::Confirmed) | Some(SubmissionState::Rejected)
            ) {
                return Ok(terminal[&ready.message_id]);
            }
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(ready.message_id) {
                return Err(DispatchError::AlreadyInFlight(ready.message_id));
            }
            terminal.insert(ready.message_id, SubmissionState::InFlight);
        }
        self.metrics.in_flight_submissions.inc();

        let destination = self
            .destinations
            .get(&ready.destination_domain)
            .ok_or(DispatchError::NoSubmitter(ready.destination_domain));

        let outcome = match destination {
            Ok(destination) => destination.submit(&ready).await,
            Err(e) => Err(e.to_string()),
        };

        self.in_flight.lock().await.remove(&ready.message_id);
        self.metrics.in_flight_submissions.dec();

        let state = match outcome {
            Ok(state) => state,
            Err(e) => {
                warn!(message_id = %ready.message_id, error = %e, "submission failed after exhausting retries");
                self.metrics.submissions_failed_total.inc();
                self.terminal.lock().await.insert(ready.message_id, SubmissionState::Failed);
                return Err(DispatchError::RetriesExhausted(e));
            }
        };

        // Once Confirmed or Rejected, the state never changes again
        // (spec.md §8: at most one Confirmed transition per message_id).
        {
            let mut terminal = self.terminal.lock().await;
            let current = terminal.get(&ready.message_id).copied();
            if !matches!(current, Some(SubmissionState::Confirmed) | Some(SubmissionState::Rejected)) {
                terminal.insert(ready.message_id, state);
            }
        }

        match state {
            SubmissionState::Confirmed => {
                self.metrics.submissions_confirmed_total.inc();
                info!(message_id = %ready.message_id, "submission confirmed");
                self.notify_relayed(ready.message_id).await;
            }
            SubmissionState::Rejected => {
                self.metrics.submissions_rejected_total.inc();
                // already_relayed is expected and success-equivalent (spec.md §4.7).
                info!(message_id = %ready.message_id, "submission rejected (expected if already relayed)");
                self.notify_relayed(ready.message_id).await;
            }
            SubmissionState::Failed => {
                self.metrics.submissions_failed_total.inc();
            }
            SubmissionState::Queued | SubmissionState::InFlight => {}
        }

        Ok(state)
    }

    /// Informs every configured attester source that `message_id` has
    /// been relayed, best-effort (spec.md §4.7: "so their API stops
    /// advertising the attestation as ready"). A failure here is not
    /// alarmed: the store's own `expires_at_ms`/sweep eventually clears
    /// the entry regardless.
    async fn notify_relayed(&self, message_id: MessageId) {
        for source in &self.attester_sources {
            let Ok(url) = source.join(&format!("/attestation/{}/relayed", message_id.to_hex())) else {
                continue;
            };
            if let Err(e) = self.http.post(url).send().await {
                warn!(source = %source, %message_id, error = %e, "best-effort mark_relayed notification failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_evm_states_round_trip() {
        assert_eq!(
            translate_evm_state(bridge_evm::SubmissionState::Confirmed),
            SubmissionState::Confirmed
        );
        assert_eq!(
            translate_substrate_state(bridge_substrate::SubmissionState::Rejected),
            SubmissionState::Rejected
        );
    }
}
