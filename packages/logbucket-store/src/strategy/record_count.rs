//! Upload strategy triggered purely by uploadable record count.

use std::time::{Duration, Instant};

use logbucket_core::{BackoffPolicy, StorageStatus, UploadDecision, UploadStrategy};
use parking_lot::Mutex;

/// `UPLOAD` once `records_count >= threshold`, otherwise `NOOP`.
pub struct RecordCountStrategy {
    threshold: u64,
    poll_interval: Duration,
    backoff: BackoffPolicy,
    attempt: Mutex<u32>,
}

impl RecordCountStrategy {
    /// Creates a strategy that uploads once `records_count` reaches `threshold`,
    /// polling every `poll_interval` while below it.
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

impl UploadStrategy for RecordCountStrategy {
    fn decide(&self, status: StorageStatus, _now: Instant) -> UploadDecision {
        if status.records_count >= self.threshold {
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
        tracing::debug!(reason, attempt = *attempt, ?delay, "record-count strategy backing off");
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(records_count: u64) -> StorageStatus {
        StorageStatus {
            records_count,
            consumed_volume: 0,
        }
    }

    #[test]
    fn below_threshold_is_noop() {
        let strategy = RecordCountStrategy::new(10, Duration::from_secs(1));
        assert_eq!(strategy.decide(status(9), Instant::now()), UploadDecision::Noop);
    }

    #[test]
    fn at_threshold_is_upload() {
        let strategy = RecordCountStrategy::new(10, Duration::from_secs(1));
        assert_eq!(strategy.decide(status(10), Instant::now()), UploadDecision::Upload);
    }

    #[test]
    fn above_threshold_is_upload() {
        let strategy = RecordCountStrategy::new(10, Duration::from_secs(1));
        assert_eq!(strategy.decide(status(20), Instant::now()), UploadDecision::Upload);
    }
}
