//! Concrete adapters, strategies, and the upload controller for the durable
//! bucketed log-record store defined by `logbucket-core`.

pub mod controller;
pub mod shutdown;
pub mod storage;
pub mod strategy;

pub use controller::UploadController;
pub use shutdown::ShutdownHandle;
pub use storage::InMemoryBucketStore;
#[cfg(feature = "sqlite")]
pub use storage::SqliteBucketStore;
pub use strategy::{CompositeStrategy, PeriodicStrategy, RecordCountStrategy, VolumeStrategy};
