//! Upload decision policy and backoff contract.
//!
//! A strategy receives the store's [`StorageStatus`] and decides whether the
//! controller should upload, clean up, or do nothing. Strategies are pure
//! with respect to their own interior-mutable fields (e.g. `last_upload_time`);
//! the controller holds one instance and calls it serially from its tick loop.

use std::time::{Duration, Instant};

use crate::record::StorageStatus;

/// Decision returned by [`UploadStrategy::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadDecision {
    /// Nothing to do right now.
    Noop,
    /// Dispense and deliver buckets.
    Upload,
    /// Discard the oldest `Free` buckets until under a soft volume target.
    Cleanup,
}

/// Policy deciding when to upload and how to react to delivery failures.
///
/// Implementations are called serially from the controller's single tick
/// context, so interior mutability (e.g. `AtomicU32`, `Mutex`) is sufficient
/// and a `&mut self` receiver is not required.
pub trait UploadStrategy: Send + Sync {
    /// Decides what the controller should do given the current status.
    fn decide(&self, status: StorageStatus, now: Instant) -> UploadDecision;

    /// Delay before the controller should call `decide` again after a `Noop`.
    fn next_tick_delay(&self) -> Duration;

    /// Called when a dispensed bucket was delivered successfully. Resets backoff.
    fn on_success(&self) {}

    /// Called when delivery failed for an application-level reason.
    /// Returns the delay before the next retry should be attempted.
    fn on_failure(&self, reason: &str) -> Duration;

    /// Called when a dispensed bucket's delivery deadline expired without a
    /// transport callback. Returns the delay before the next retry.
    fn on_timeout(&self, bucket_id: i64) -> Duration {
        let _ = bucket_id;
        self.on_failure("timeout")
    }
}

/// Exponential backoff with a configurable base delay and cap.
///
/// Shared by strategies that need a retry delay on `on_failure`/`on_timeout`:
/// `delay = min(max, base * multiplier^attempt)`, with `attempt` incremented
/// on every failure and reset on `on_success`.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Upper bound on the computed delay.
    pub max: Duration,
    /// Growth factor applied per consecutive failure.
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(300),
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given zero-based consecutive-failure count.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(32) as i32);
        let scaled = self.base.as_secs_f64() * factor;
        if !scaled.is_finite() || scaled >= self.max.as_secs_f64() {
            return self.max;
        }
        Duration::from_secs_f64(scaled)
    }
}
