//! Configuration for storage behavior, applied per [`BucketStore`](super::store::BucketStore).

/// Configuration for a `BucketStore` instance.
///
/// Controls bucket sizing limits and where/how the persistent medium
/// is tuned. All fields are plain and have conservative defaults; there is
/// no builder, mirroring `StorageConfig`/`ServerConfig`'s plain-struct style.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum size of a single bucket, in bytes. Must be positive.
    pub max_bucket_bytes: u64,
    /// Maximum number of records in a single bucket. Must be positive.
    pub max_bucket_records: u32,
    /// Location of the persistent backing store (path, connection string, etc).
    ///
    /// Ignored by adapters that have no on-disk location (e.g. in-memory).
    pub storage_location: String,
    /// Engine-specific tunables. Empty is the safe default.
    pub optimization_flags: OptimizationFlags,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_bucket_bytes: 16 * 1024,
            max_bucket_records: 256,
            storage_location: String::new(),
            optimization_flags: OptimizationFlags::default(),
        }
    }
}

/// Named, composable optimization toggles for the persistent medium.
///
/// Represented as named booleans rather than a bitmask so adapters can
/// match on fields instead of decoding magic numbers; each adapter decides
/// independently how (or whether) to apply a given flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizationFlags {
    /// Disable fsync-on-commit durability guarantees for higher throughput.
    pub relaxed_durability: bool,
    /// Keep the write-ahead/journal in RAM instead of on disk.
    pub in_memory_journal: bool,
    /// Keep temporary scratch state (sort buffers, etc) in RAM.
    pub in_memory_scratch: bool,
    /// Skip bookkeeping of per-statement change counts.
    pub suppress_change_counts: bool,
}
