//! Attestation Fetcher and Destination Submitter dispatch (spec.md §4.6,
//! §4.7): the relayer-side half of the pipeline. No teacher equivalent
//! exists for cross-service polling/dispatch; grounded on the
//! `bridge-evm`/`bridge-substrate` submitters for the per-destination
//! submission shape and on `bridge-attester`'s `StatusCounters`/
//! `CancellationToken` idiom for the poll loop (see DESIGN.md).

pub mod config;
pub mod dispatcher;
pub mod fetcher;
pub mod metrics;

pub use config::RelayerConfig;
pub use dispatcher::{Destination, DispatchError, RelayDispatcher, SubmissionState};
pub use fetcher::{AttestationFetcher, SourceHealth};
pub use metrics::RelayerMetrics;
