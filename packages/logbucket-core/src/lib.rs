//! Domain types and trait boundaries for the durable bucketed log-record store.
//!
//! This crate defines the shapes producers, the uploader, and the persistence
//! adapters agree on — [`Record`], [`Bucket`] metadata, [`StorageStatus`] — and
//! the trait seams between them: [`BucketStore`], [`UploadStrategy`],
//! [`Transport`]. It has no I/O of its own; concrete adapters live in
//! `logbucket-store`.

pub mod config;
pub mod error;
pub mod record;
pub mod store;
pub mod strategy;
pub mod transport;

pub use config::{OptimizationFlags, StoreConfig};
pub use error::{ControllerError, StoreError, TransportError};
pub use record::{BucketInfo, BucketState, LogBucket, Record, StorageStatus};
pub use store::BucketStore;
pub use strategy::{BackoffPolicy, UploadDecision, UploadStrategy};
pub use transport::{DeliveryOutcome, Transport};
