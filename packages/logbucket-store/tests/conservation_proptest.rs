//! Property tests for the conservation invariants I1/I2: after any sequence
//! of `add_record`/`next_bucket`/`remove_bucket`/`rollback_bucket` calls,
//! `status()` must equal a plain model of what's still `Free`.

use logbucket_core::{BucketStore, Record, StoreConfig};
use logbucket_store::InMemoryBucketStore;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Add(u16),
    Dispense,
    Commit,
    Rollback,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u16..=50).prop_map(Op::Add),
        Just(Op::Dispense),
        Just(Op::Commit),
        Just(Op::Rollback),
    ]
}

proptest! {
    #[test]
    fn in_memory_store_conserves_status_under_random_operation_sequences(
        ops in proptest::collection::vec(op_strategy(), 0..100)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = InMemoryBucketStore::new(&StoreConfig {
                max_bucket_bytes: 200,
                max_bucket_records: 4,
                ..StoreConfig::default()
            });

            // Reference model: free_records/free_bytes mirror I2's definition
            // (sum over Free buckets); in_flight tracks the single dispensed,
            // not-yet-resolved bucket this sequence ever has outstanding at once.
            let mut free_records: u64 = 0;
            let mut free_bytes: u64 = 0;
            let mut in_flight: Option<(i64, u64, u64)> = None;

            for op in ops {
                match op {
                    Op::Add(size) => {
                        let size = u64::from(size);
                        if store.add_record(Record::new(vec![0; size as usize])).await.is_ok() {
                            free_records += 1;
                            free_bytes += size;
                        }
                    }
                    Op::Dispense => {
                        if in_flight.is_none() {
                            if let Some(bucket) = store.next_bucket().await {
                                let records = bucket.records.len() as u64;
                                let bytes: u64 = bucket.records.iter().map(Record::size).sum();
                                free_records -= records;
                                free_bytes -= bytes;
                                in_flight = Some((bucket.bucket_id, records, bytes));
                            }
                        }
                    }
                    Op::Commit => {
                        if let Some((bucket_id, _, _)) = in_flight.take() {
                            store.remove_bucket(bucket_id).await;
                        }
                    }
                    Op::Rollback => {
                        if let Some((bucket_id, records, bytes)) = in_flight.take() {
                            store.rollback_bucket(bucket_id).await;
                            free_records += records;
                            free_bytes += bytes;
                        }
                    }
                }

                let status = store.status().await;
                prop_assert_eq!(status.records_count, free_records);
                prop_assert_eq!(status.consumed_volume, free_bytes);
            }
        });
    }
}
