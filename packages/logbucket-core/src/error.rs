//! Error kinds surfaced across the store, controller, and transport boundaries.

/// Errors a [`BucketStore`](super::store::BucketStore) raises to its caller.
///
/// Per the propagation policy: `TooLarge` is a producer-facing rejection and
/// always surfaces. Underlying medium failures from `add_record` also
/// surface as `Storage`; the uploader-facing operations (`next_bucket`,
/// `remove_bucket`, `rollback_bucket`) catch and log `Storage` internally
/// instead of propagating it, so a single bad tick can't crash the uploader.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record's own size exceeds `max_bucket_bytes`; not retried.
    #[error("record of {record_size} bytes exceeds max_bucket_bytes ({max_bucket_bytes})")]
    TooLarge {
        /// Size of the rejected record, in bytes.
        record_size: u64,
        /// Configured ceiling the record exceeded.
        max_bucket_bytes: u64,
    },

    /// The persistent medium failed to execute an operation.
    #[error("storage backend failed: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Errors surfaced by a [`Transport`](super::transport::Transport) implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Delivery failed for an application-level reason (rejected, 4xx, etc.).
    #[error("delivery failed: {reason}")]
    Failed {
        /// Human-readable failure reason from the transport.
        reason: String,
    },

    /// Delivery did not complete before the controller-managed deadline.
    #[error("delivery timed out")]
    Timeout,
}

/// Errors returned by [`UploadController`](crate) administrative operations.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The underlying store rejected a record as too large.
    #[error(transparent)]
    Store(#[from] StoreError),
}
