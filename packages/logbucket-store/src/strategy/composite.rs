//! The default, composite upload strategy.
//!
//! Combines volume, record-count, and time-since-last-upload triggers, plus
//! a hard cap that forces cleanup when the store is at risk of unbounded
//! growth regardless of uploader progress.

use std::time::{Duration, Instant};

use logbucket_core::{BackoffPolicy, StorageStatus, UploadDecision, UploadStrategy};
use parking_lot::Mutex;

/// Upload when volume, record count, or elapsed time crosses its threshold;
/// cleanup when volume reaches `hard_cap` regardless of the other triggers.
pub struct CompositeStrategy {
    volume_threshold: u64,
    record_count_threshold: u64,
    period: Duration,
    hard_cap: u64,
    poll_interval: Duration,
    last_upload_time: Mutex<Instant>,
    backoff: BackoffPolicy,
    attempt: Mutex<u32>,
}

impl CompositeStrategy {
    /// Creates the default strategy with the given thresholds.
    ///
    /// `hard_cap` should exceed `volume_threshold`; when it doesn't, `CLEANUP`
    /// simply takes priority over `UPLOAD` at every tick once `volume_threshold`
    /// is crossed.
    #[must_use]
    pub fn new(
        volume_threshold: u64,
        record_count_threshold: u64,
        period: Duration,
        hard_cap: u64,
        poll_interval: Duration,
    ) -> Self {
        Self {
            volume_threshold,
            record_count_threshold,
            period,
            hard_cap,
            poll_interval,
            last_upload_time: Mutex::new(Instant::now()),
            backoff: BackoffPolicy::default(),
            attempt: Mutex::new(0),
        }
    }
}

impl UploadStrategy for CompositeStrategy {
    fn decide(&self, status: StorageStatus, now: Instant) -> UploadDecision {
        if status.consumed_volume >= self.hard_cap {
            return UploadDecision::Cleanup;
        }

        let mut last = self.last_upload_time.lock();
        let period_elapsed = now >= *last + self.period;

        let volume_trigger = status.consumed_volume >= self.volume_threshold;
        let count_trigger = status.records_count >= self.record_count_threshold;

        if volume_trigger || count_trigger || period_elapsed {
            *last = now;
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
        tracing::debug!(reason, attempt = *attempt, ?delay, "composite strategy backing off");
        delay
    }
}
