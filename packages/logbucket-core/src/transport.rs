//! The transport boundary consumed by the upload controller.
//!
//! The network transport that actually sends bucket payloads is explicitly
//! out of scope (spec §1); this module only defines the trait seam the
//! controller calls into and the outcome it reports back.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::record::LogBucket;

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The bucket was accepted by the remote end.
    Delivered,
    /// Delivery failed; carries the reason for backoff bookkeeping.
    Failed(TransportError),
}

/// Sends a dispensed [`LogBucket`] to its destination.
///
/// Assumed asynchronous; implementations may complete (or invoke any
/// internal callbacks) on arbitrary threads, so the controller marshals
/// results back onto its own single-tick context before mutating any
/// shared state.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Attempts to deliver `bucket`, resolving once the attempt concludes
    /// (successfully or not) — the controller applies its own timeout on
    /// top of this future rather than relying on the transport to time out.
    async fn send(&self, bucket: LogBucket) -> DeliveryOutcome;
}
