//! In-memory [`BucketStore`] implementation backed by a mutex-guarded, ordered bucket list.
//!
//! No persistence across restarts: a fresh `InMemoryBucketStore` starts with
//! an empty log and no recovery step. Suitable for tests, benchmarks, and
//! hosts that accept losing buffered records on crash.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use logbucket_core::{BucketInfo, BucketState, LogBucket, Record, StorageStatus, StoreConfig};
use logbucket_core::{BucketStore, StoreError};
use parking_lot::Mutex;

/// A single bucket row as tracked by the in-memory store.
struct BucketEntry {
    state: BucketState,
    records: Vec<Record>,
    size_in_bytes: u64,
}

impl BucketEntry {
    fn size_in_records(&self) -> u32 {
        // Bounded by max_bucket_records (a u32) by construction.
        #[allow(clippy::cast_possible_truncation)]
        let count = self.records.len() as u32;
        count
    }
}

/// All mutable state behind the store's single exclusive lock.
struct MemoryState {
    buckets: BTreeMap<i64, BucketEntry>,
    next_bucket_id: i64,
    /// The bucket currently accepting appends, or `None` if the next
    /// `add_record` must rotate before it can append (I4).
    current: Option<i64>,
    /// Cache of `(bytes, records)` for dispensed buckets, used to restore
    /// counters on rollback (ownership note in spec §3).
    dispensed_cache: HashMap<i64, (u64, u32)>,
}

impl MemoryState {
    fn rotate(&mut self) -> i64 {
        let id = self.next_bucket_id;
        self.next_bucket_id += 1;
        self.buckets.insert(
            id,
            BucketEntry {
                state: BucketState::Free,
                records: Vec::new(),
                size_in_bytes: 0,
            },
        );
        self.current = Some(id);
        id
    }
}

/// Mutex-guarded in-memory `BucketStore`.
///
/// A single `parking_lot::Mutex` guards the whole bucket list and its
/// counters, giving the same single-exclusive-lock-per-operation semantics
/// §5 requires. Unlike a sharded map, this makes the rotate-then-append and
/// dispense-then-maybe-rotate sequences trivially atomic.
pub struct InMemoryBucketStore {
    state: Mutex<MemoryState>,
    max_bucket_bytes: u64,
    max_bucket_records: u32,
}

impl InMemoryBucketStore {
    /// Creates a fresh, empty store with an initial current bucket
    /// (mirrors the "no buckets exist -> create one" step of recovery).
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        let mut state = MemoryState {
            buckets: BTreeMap::new(),
            next_bucket_id: 1,
            current: None,
            dispensed_cache: HashMap::new(),
        };
        state.rotate();

        Self {
            state: Mutex::new(state),
            max_bucket_bytes: config.max_bucket_bytes,
            max_bucket_records: config.max_bucket_records,
        }
    }
}

#[async_trait]
impl BucketStore for InMemoryBucketStore {
    async fn add_record(&self, record: Record) -> Result<BucketInfo, StoreError> {
        let size = record.size();
        if size > self.max_bucket_bytes {
            return Err(StoreError::TooLarge {
                record_size: size,
                max_bucket_bytes: self.max_bucket_bytes,
            });
        }

        let mut state = self.state.lock();

        let needs_rotation = match state.current {
            Some(id) => {
                let bucket = &state.buckets[&id];
                bucket.size_in_records() + 1 > self.max_bucket_records
                    || bucket.size_in_bytes + size > self.max_bucket_bytes
            }
            None => true,
        };

        let bucket_id = if needs_rotation {
            state.rotate()
        } else {
            state.current.expect("current is Some when rotation is not needed")
        };

        let bucket = state
            .buckets
            .get_mut(&bucket_id)
            .expect("just-rotated-or-current bucket always exists");
        bucket.records.push(record);
        bucket.size_in_bytes += size;
        let logs_count = bucket.size_in_records();

        tracing::trace!(bucket_id, logs_count, size, "appended record");

        Ok(BucketInfo { bucket_id, logs_count })
    }

    async fn next_bucket(&self) -> Option<LogBucket> {
        let mut state = self.state.lock();

        let dispensed_id = state
            .buckets
            .iter()
            .find(|(_, b)| b.state == BucketState::Free)
            .map(|(id, _)| *id)?;

        let bucket = state
            .buckets
            .get_mut(&dispensed_id)
            .expect("id came from iterating buckets");
        bucket.state = BucketState::InUse;
        let records = bucket.records.clone();
        let size_in_bytes = bucket.size_in_bytes;
        let size_in_records = bucket.size_in_records();

        state
            .dispensed_cache
            .insert(dispensed_id, (size_in_bytes, size_in_records));

        let more_free_remain = state.buckets.values().any(|b| b.state == BucketState::Free);
        if state.current == Some(dispensed_id) {
            state.current = None;
            if more_free_remain {
                state.rotate();
            }
        }

        tracing::debug!(bucket_id = dispensed_id, size_in_records, size_in_bytes, "dispensed bucket");

        Some(LogBucket {
            bucket_id: dispensed_id,
            records,
        })
    }

    async fn remove_bucket(&self, bucket_id: i64) {
        let mut state = self.state.lock();
        if state.buckets.remove(&bucket_id).is_some() {
            state.dispensed_cache.remove(&bucket_id);
            tracing::debug!(bucket_id, "removed bucket");
        }
    }

    async fn rollback_bucket(&self, bucket_id: i64) {
        let mut state = self.state.lock();
        let Some(bucket) = state.buckets.get_mut(&bucket_id) else {
            return;
        };
        if bucket.state != BucketState::InUse {
            return;
        }
        bucket.state = BucketState::Free;
        state.dispensed_cache.remove(&bucket_id);
        tracing::debug!(bucket_id, "rolled back bucket");
    }

    async fn status(&self) -> StorageStatus {
        let state = self.state.lock();
        let mut records_count = 0u64;
        let mut consumed_volume = 0u64;
        for bucket in state.buckets.values() {
            if bucket.state == BucketState::Free {
                records_count += u64::from(bucket.size_in_records());
                consumed_volume += bucket.size_in_bytes;
            }
        }
        StorageStatus {
            records_count,
            consumed_volume,
        }
    }
}
