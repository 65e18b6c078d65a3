//! Upload strategy triggered by elapsed wall-clock time since the last upload.

use std::time::{Duration, Instant};

use logbucket_core::{BackoffPolicy, StorageStatus, UploadDecision, UploadStrategy};
use parking_lot::Mutex;

/// `UPLOAD` once `now >= last_upload_time + period`, resetting `last_upload_time`
/// on that tick. The first tick's baseline is construction time.
pub struct PeriodicStrategy {
    period: Duration,
    last_upload_time: Mutex<Instant>,
    backoff: BackoffPolicy,
    attempt: Mutex<u32>,
}

impl PeriodicStrategy {
    /// Creates a strategy that fires every `period`, measured from construction time.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_upload_time: Mutex::new(Instant::now()),
            backoff: BackoffPolicy::default(),
            attempt: Mutex::new(0),
        }
    }
}

impl UploadStrategy for PeriodicStrategy {
    fn decide(&self, _status: StorageStatus, now: Instant) -> UploadDecision {
        let mut last = self.last_upload_time.lock();
        if now >= *last + self.period {
            *last = now;
            UploadDecision::Upload
        } else {
            UploadDecision::Noop
        }
    }

    fn next_tick_delay(&self) -> Duration {
        self.period
    }

    fn on_success(&self) {
        *self.attempt.lock() = 0;
    }

    fn on_failure(&self, reason: &str) -> Duration {
        let mut attempt = self.attempt.lock();
        let delay = self.backoff.delay_for_attempt(*attempt);
        *attempt += 1;
        tracing::debug!(reason, attempt = *attempt, ?delay, "periodic strategy backing off");
        delay
    }
}
