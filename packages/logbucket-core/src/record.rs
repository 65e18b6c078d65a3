//! Record and bucket value types for the storage layer.
//!
//! Defines the core data structures exchanged across the [`BucketStore`](super::store::BucketStore)
//! boundary: [`Record`], [`BucketInfo`], [`LogBucket`], [`StorageStatus`], and
//! the internal [`BucketState`] a bucket moves through.

use serde::{Deserialize, Serialize};

/// An opaque, length-known byte blob produced by the application.
///
/// Immutable once constructed. The payload schema is not interpreted by the
/// store; it is carried as an uninterpreted byte sequence end to end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    data: Vec<u8>,
}

impl Record {
    /// Creates a record from an owned byte buffer.
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// The record's payload.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The record's size in bytes, equal to the length of [`data`](Record::data).
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Consumes the record, returning its owned payload.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Lifecycle state of a persisted bucket.
///
/// `Free` buckets are eligible to be dispensed to the uploader. `InUse`
/// buckets have been dispensed and are awaiting commit (remove) or rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BucketState {
    /// Eligible for dispense via `next_bucket`.
    Free = 0,
    /// Dispensed to the uploader, awaiting commit or rollback.
    InUse = 1,
}

/// Identity and size of a bucket, returned by `add_record` after an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    /// Monotonically increasing bucket identifier.
    pub bucket_id: i64,
    /// Number of records in the bucket after the insert that produced this value.
    pub logs_count: u32,
}

/// A bucket handed to the uploader by `next_bucket`.
///
/// A borrowed view: the store retains ownership of the underlying rows until
/// the caller commits ([`remove_bucket`](super::store::BucketStore::remove_bucket))
/// or rolls back ([`rollback_bucket`](super::store::BucketStore::rollback_bucket)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBucket {
    /// Identifier of the dispensed bucket.
    pub bucket_id: i64,
    /// Records in insertion order.
    pub records: Vec<Record>,
}

impl LogBucket {
    /// Total byte size of all records in the bucket.
    #[must_use]
    pub fn size_in_bytes(&self) -> u64 {
        self.records.iter().map(Record::size).sum()
    }

    /// Number of records in the bucket.
    #[must_use]
    pub fn size_in_records(&self) -> u32 {
        // Record counts are bounded by max_bucket_records (a u32), never overflows in practice.
        #[allow(clippy::cast_possible_truncation)]
        let count = self.records.len() as u32;
        count
    }
}

/// Point-in-time counters exposed to upload strategies.
///
/// `records_count` and `consumed_volume` cover only `Free` buckets — the
/// portion of the store a strategy can actually cause to be uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageStatus {
    /// Records in `Free` buckets (uploadable).
    pub records_count: u64,
    /// Bytes in `Free` buckets (uploadable).
    pub consumed_volume: u64,
}
