//! The shared error-kind taxonomy from spec.md §7.
//!
//! Every crate defines its own `thiserror` error enum for the errors it can
//! actually produce (see `bridge-evm::AdapterError`,
//! `bridge-attester::StoreError`, etc) — this module only provides the
//! cross-cutting [`ErrorKind`] classification used to label the
//! `errors_total{type, source}` metric (spec.md §7) uniformly regardless of
//! which crate raised the error.

use std::fmt;

/// The seven error kinds named in spec.md §7. This is a classification,
/// not a single error type: concrete errors implement
/// [`Classify::kind`] to report which bucket they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing/invalid setting; surfaced at startup; fatal.
    Configuration,
    /// RPC, HTTP, WebSocket I/O failure; retried with backoff.
    Transport,
    /// Malformed on-chain event, unexpected encoding; the event is skipped.
    ChainProtocol,
    /// `MessageBytesMismatch` between sightings of a `message_id`; fatal to
    /// the request path, indicates a bug.
    Canonicalization,
    /// Key misconfiguration or self-verify failure; fatal to the attester.
    Signing,
    /// `add_signature` on a known `(message_id, attester_id)` pair;
    /// recoverable, logged at info.
    Duplicate,
    /// Submission rejected by the destination chain.
    Destination,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Transport => "transport",
            ErrorKind::ChainProtocol => "chain_protocol",
            ErrorKind::Canonicalization => "canonicalization",
            ErrorKind::Signing => "signing",
            ErrorKind::Duplicate => "duplicate",
            ErrorKind::Destination => "destination",
        };
        write!(f, "{s}")
    }
}

/// Implemented by every crate-local error enum so callers can route it to
/// the `errors_total{type, source}` metric and to the propagation policy in
/// spec.md §7: only `Configuration` and signing self-verify errors halt the
/// process, everything else is counted and reflected in `/health`.
pub trait Classify {
    fn kind(&self) -> ErrorKind;

    /// Whether this error should halt the owning process (spec.md §7).
    fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Configuration | ErrorKind::Signing)
    }
}
