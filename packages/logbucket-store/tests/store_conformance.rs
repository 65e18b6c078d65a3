//! Shared acceptance suite run against every `BucketStore` adapter, so both
//! are held to identical behavior rather than testing each implementation's
//! quirks separately.

use logbucket_core::{BucketStore, Record, StoreConfig, StoreError};
use logbucket_store::{InMemoryBucketStore, SqliteBucketStore};

async fn sqlite_store(max_bytes: u64, max_records: u32) -> (tempfile::TempDir, SqliteBucketStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("buckets.sqlite3");
    let config = StoreConfig {
        max_bucket_bytes: max_bytes,
        max_bucket_records: max_records,
        storage_location: path.to_string_lossy().into_owned(),
        ..StoreConfig::default()
    };
    let store = SqliteBucketStore::open(&config).await.expect("open sqlite store");
    (dir, store)
}

fn memory_store(max_bytes: u64, max_records: u32) -> InMemoryBucketStore {
    InMemoryBucketStore::new(&StoreConfig {
        max_bucket_bytes: max_bytes,
        max_bucket_records: max_records,
        ..StoreConfig::default()
    })
}

// S1: three 100-byte records under (max_bytes=1024, max_records=2) produce
// buckets {[R1,R2], [R3]} with status {3, 300}, and next_bucket/status track
// the dispense exactly.
async fn scenario_s1(store: &dyn BucketStore) {
    let r1 = Record::new(vec![1; 100]);
    let r2 = Record::new(vec![2; 100]);
    let r3 = Record::new(vec![3; 100]);

    let info1 = store.add_record(r1).await.unwrap();
    let info2 = store.add_record(r2).await.unwrap();
    let info3 = store.add_record(r3).await.unwrap();

    assert_eq!(info1.bucket_id, info2.bucket_id);
    assert_ne!(info2.bucket_id, info3.bucket_id);

    let status = store.status().await;
    assert_eq!(status.records_count, 3);
    assert_eq!(status.consumed_volume, 300);

    let dispensed = store.next_bucket().await.unwrap();
    assert_eq!(dispensed.bucket_id, info1.bucket_id);
    assert_eq!(dispensed.records.len(), 2);

    let status_after = store.status().await;
    assert_eq!(status_after.records_count, 1);
    assert_eq!(status_after.consumed_volume, 100);
}

#[tokio::test]
async fn memory_scenario_s1() {
    scenario_s1(&memory_store(1024, 2)).await;
}

#[tokio::test]
async fn sqlite_scenario_s1() {
    let (_dir, store) = sqlite_store(1024, 2).await;
    scenario_s1(&store).await;
}

// S2: rollback after S1's dispense restores status and hands back the same bucket.
async fn scenario_s2(store: &dyn BucketStore) {
    for payload in [vec![1; 100], vec![2; 100], vec![3; 100]] {
        store.add_record(Record::new(payload)).await.unwrap();
    }

    let dispensed = store.next_bucket().await.unwrap();
    store.rollback_bucket(dispensed.bucket_id).await;

    let status = store.status().await;
    assert_eq!(status.records_count, 3);
    assert_eq!(status.consumed_volume, 300);

    let again = store.next_bucket().await.unwrap();
    assert_eq!(again.bucket_id, dispensed.bucket_id);
}

#[tokio::test]
async fn memory_scenario_s2() {
    scenario_s2(&memory_store(1024, 2)).await;
}

#[tokio::test]
async fn sqlite_scenario_s2() {
    let (_dir, store) = sqlite_store(1024, 2).await;
    scenario_s2(&store).await;
}

// S3: remove after S1's dispense decrements total_records and the removed
// bucket never reappears from next_bucket.
async fn scenario_s3(store: &dyn BucketStore) {
    for payload in [vec![1; 100], vec![2; 100], vec![3; 100]] {
        store.add_record(Record::new(payload)).await.unwrap();
    }

    let dispensed = store.next_bucket().await.unwrap();
    store.remove_bucket(dispensed.bucket_id).await;

    let status = store.status().await;
    assert_eq!(status.records_count, 1);
    assert_eq!(status.consumed_volume, 100);

    let next = store.next_bucket().await.unwrap();
    assert_ne!(next.bucket_id, dispensed.bucket_id);
    assert!(store.next_bucket().await.is_none());
}

#[tokio::test]
async fn memory_scenario_s3() {
    scenario_s3(&memory_store(1024, 2)).await;
}

#[tokio::test]
async fn sqlite_scenario_s3() {
    let (_dir, store) = sqlite_store(1024, 2).await;
    scenario_s3(&store).await;
}

// Property 5 / I6: a record larger than max_bucket_bytes is rejected and
// leaves every counter untouched.
async fn too_large_rejection(store: &dyn BucketStore, max_bytes: u64) {
    let err = store.add_record(Record::new(vec![0; (max_bytes + 1) as usize])).await.unwrap_err();
    assert!(matches!(err, StoreError::TooLarge { .. }));

    let status = store.status().await;
    assert_eq!(status.records_count, 0);
    assert_eq!(status.consumed_volume, 0);
}

#[tokio::test]
async fn memory_too_large_rejection() {
    too_large_rejection(&memory_store(100, 10), 100).await;
}

#[tokio::test]
async fn sqlite_too_large_rejection() {
    let (_dir, store) = sqlite_store(100, 10).await;
    too_large_rejection(&store, 100).await;
}

// Property 12: remove_bucket is idempotent, rollback_bucket on a Free bucket is a no-op.
async fn idempotence(store: &dyn BucketStore) {
    store.add_record(Record::new(vec![1; 10])).await.unwrap();
    let dispensed = store.next_bucket().await.unwrap();

    store.remove_bucket(dispensed.bucket_id).await;
    store.remove_bucket(dispensed.bucket_id).await;
    let status = store.status().await;
    assert_eq!(status.records_count, 0);

    store.add_record(Record::new(vec![2; 10])).await.unwrap();
    let before = store.status().await;
    store.rollback_bucket(999_999).await;
    let after = store.status().await;
    assert_eq!(before, after);
}

#[tokio::test]
async fn memory_idempotence() {
    idempotence(&memory_store(1024, 2)).await;
}

#[tokio::test]
async fn sqlite_idempotence() {
    let (_dir, store) = sqlite_store(1024, 2).await;
    idempotence(&store).await;
}

// S4/S5: the sqlite adapter must survive a reopen, and must truncate when
// reopened with limits a persisted bucket now violates. Only meaningful for
// the durable adapter; the in-memory one has no persistence contract.
#[tokio::test]
async fn sqlite_restart_recovery_preserves_data_under_same_limits() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("buckets.sqlite3");
    let config = StoreConfig {
        max_bucket_bytes: 500,
        max_bucket_records: 100,
        storage_location: path.to_string_lossy().into_owned(),
        ..StoreConfig::default()
    };

    {
        let store = SqliteBucketStore::open(&config).await.unwrap();
        for _ in 0..5 {
            store.add_record(Record::new(vec![0; 200])).await.unwrap();
        }
        // Simulate a crash: no next_bucket/remove_bucket, store is just dropped.
    }

    let store = SqliteBucketStore::open(&config).await.unwrap();
    let status = store.status().await;
    assert_eq!(status.records_count, 5);
    assert_eq!(status.consumed_volume, 1000);

    let dispensed = store.next_bucket().await.unwrap();
    assert_eq!(dispensed.records.len(), 5);
    for record in &dispensed.records {
        assert_eq!(record.data(), &[0u8; 200][..]);
    }
}

#[tokio::test]
async fn sqlite_reopen_with_tighter_limits_truncates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("buckets.sqlite3");
    let loose = StoreConfig {
        max_bucket_bytes: 500,
        max_bucket_records: 100,
        storage_location: path.to_string_lossy().into_owned(),
        ..StoreConfig::default()
    };

    {
        let store = SqliteBucketStore::open(&loose).await.unwrap();
        for _ in 0..5 {
            store.add_record(Record::new(vec![0; 200])).await.unwrap();
        }
    }

    let tight = StoreConfig {
        max_bucket_bytes: 300,
        ..loose
    };
    let store = SqliteBucketStore::open(&tight).await.unwrap();
    let status = store.status().await;
    assert_eq!(status.records_count, 0);
    assert_eq!(status.consumed_volume, 0);
    assert!(store.next_bucket().await.is_none());
}

#[tokio::test]
async fn sqlite_reopen_with_tighter_record_limit_truncates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("buckets.sqlite3");
    let loose = StoreConfig {
        max_bucket_bytes: 10_000,
        max_bucket_records: 5,
        storage_location: path.to_string_lossy().into_owned(),
        ..StoreConfig::default()
    };

    {
        let store = SqliteBucketStore::open(&loose).await.unwrap();
        for _ in 0..5 {
            store.add_record(Record::new(vec![0; 10])).await.unwrap();
        }
    }

    let tight = StoreConfig {
        max_bucket_records: 2,
        ..loose
    };
    let store = SqliteBucketStore::open(&tight).await.unwrap();
    let status = store.status().await;
    assert_eq!(status.records_count, 0);
    assert_eq!(status.consumed_volume, 0);
    assert!(store.next_bucket().await.is_none());
}
