//! Concrete [`UploadStrategy`](logbucket_core::UploadStrategy) implementations.

mod composite;
mod periodic;
mod record_count;
mod volume;

pub use composite::CompositeStrategy;
pub use periodic::PeriodicStrategy;
pub use record_count::RecordCountStrategy;
pub use volume::VolumeStrategy;
