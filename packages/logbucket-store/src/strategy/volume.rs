//! Upload strategy triggered purely by consumed byte volume.

use std::time::{Duration, Instant};

use logbucket_core::{BackoffPolicy, StorageStatus, UploadDecision, UploadStrategy};
use parking_lot::Mutex;

/// `UPLOAD` once `consumed_volume >= threshold`, otherwise `NOOP`.
pub struct VolumeStrategy {
    threshold: u64,
    poll_interval: Duration,
    backoff: BackoffPolicy,
    attempt: Mutex<u32>,
}

impl VolumeStrategy {
    /// Creates a strategy that uploads once `consumed_volume` reaches `threshold`
    /// bytes, polling every `poll_interval` while below it.
    #[must_use]
    pub fn new(threshold: u64, poll_interval: Duration) -> Self {
        Self {
            threshold,
            poll_interval,
            backoff: BackoffPolicy::default(),
            attempt: Mutex::new(0),
        }
    }
}

impl UploadStrategy for VolumeStrategy {
    fn decide(&self, status: StorageStatus, _now: Instant) -> UploadDecision {
        if status.consumed_volume >= self.threshold {
            UploadDecision::Upload
        } else {
            UploadDecision::Noop
        }
    }

    fn next_tick_delay(&self) -> Duration {
        self.poll_interval
    }

    fn on_success(&self) {
        *self.attempt.lock() = 0;
    }

    fn on_failure(&self, reason: &str) -> Duration {
        let mut attempt = self.attempt.lock();
        let delay = self.backoff.delay_for_attempt(*attempt);
        *attempt += 1;
        tracing::debug!(reason, attempt = *attempt, ?delay, "volume strategy backing off");
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(consumed_volume: u64) -> StorageStatus {
        StorageStatus {
            records_count: 0,
            consumed_volume,
        }
    }

    #[test]
    fn below_threshold_is_noop() {
        let strategy = VolumeStrategy::new(100, Duration::from_secs(1));
        assert_eq!(strategy.decide(status(99), Instant::now()), UploadDecision::Noop);
    }

    #[test]
    fn at_threshold_is_upload() {
        let strategy = VolumeStrategy::new(100, Duration::from_secs(1));
        assert_eq!(strategy.decide(status(100), Instant::now()), UploadDecision::Upload);
    }

    #[test]
    fn above_threshold_is_upload() {
        let strategy = VolumeStrategy::new(100, Duration::from_secs(1));
        assert_eq!(strategy.decide(status(150), Instant::now()), UploadDecision::Upload);
    }

    #[test]
    fn failure_backs_off_and_success_resets() {
        let strategy = VolumeStrategy::new(100, Duration::from_secs(1));
        let first = strategy.on_failure("transport down");
        let second = strategy.on_failure("transport down");
        assert!(second > first);
        strategy.on_success();
        let after_reset = strategy.on_failure("transport down");
        assert_eq!(after_reset, first);
    }
}
