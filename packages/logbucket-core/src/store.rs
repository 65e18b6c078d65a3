//! The persistent, transactional record+bucket repository trait.
//!
//! Defines [`BucketStore`], the primary interface the upload controller and
//! producer threads interact with. Concrete adapters (SQLite-backed,
//! in-memory) live in `logbucket-store`; this crate only defines the seam.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::{BucketInfo, LogBucket, Record, StorageStatus};

/// The persistent, transactional repository of records and buckets.
///
/// Exclusively owns all records and buckets. Thread-safe: implementations
/// must serialize each public operation (a single exclusive lock, or the
/// natural serialization point of a transactional medium) so producer
/// threads and the uploader never observe a partially-applied mutation.
///
/// Used as `Arc<dyn BucketStore>`.
#[async_trait]
pub trait BucketStore: Send + Sync + 'static {
    /// Appends a record to the current bucket, rotating to a fresh bucket
    /// first if the append would exceed `max_bucket_bytes` or
    /// `max_bucket_records`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TooLarge`] if the record's own size exceeds
    /// `max_bucket_bytes` (rejected without mutating any counters), or
    /// [`StoreError::Storage`] if the underlying medium failed.
    async fn add_record(&self, record: Record) -> Result<BucketInfo, StoreError>;

    /// Atomically selects the `Free` bucket with the smallest id, marks it
    /// `InUse`, and returns a snapshot of its records in insertion order.
    ///
    /// Returns `None` when no `Free` bucket exists. Underlying storage
    /// errors are logged and absorbed, also yielding `None`, so a single bad
    /// tick does not propagate to the uploader.
    async fn next_bucket(&self) -> Option<LogBucket>;

    /// Deletes a bucket and all its records, reducing `total_records` by the
    /// bucket's record count.
    ///
    /// Idempotent: an unknown `bucket_id` is a no-op. Storage errors are
    /// logged and absorbed, never propagated.
    async fn remove_bucket(&self, bucket_id: i64);

    /// Returns a dispensed bucket to `Free`, restoring `unmarked_records`
    /// and `consumed_volume`.
    ///
    /// Idempotent: a bucket already `Free` (or unknown) is unchanged.
    /// Storage errors are logged and absorbed, never propagated.
    async fn rollback_bucket(&self, bucket_id: i64);

    /// A point-in-time read of uploadable record count and byte volume.
    async fn status(&self) -> StorageStatus;
}
