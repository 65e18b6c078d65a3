//! Concrete [`BucketStore`](logbucket_core::BucketStore) adapters.
//!
//! Two reference implementations, matching spec §1's "replaceable adapter"
//! framing:
//!
//! - [`memory`]: a single mutex-guarded in-memory structure. No persistence
//!   across restarts — intended for tests, benchmarks, and hosts that accept
//!   losing buffered logs on crash.
//! - [`sqlite`]: a `sqlx`-backed SQLite store with full crash recovery,
//!   schema-tightening truncation, and the rotation/dispense algorithm of
//!   the original Kaa `SQLiteDBLogStorage`.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryBucketStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBucketStore;
