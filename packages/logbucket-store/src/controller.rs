//! Binds a [`BucketStore`], [`UploadStrategy`], and [`Transport`] into the
//! running upload lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use logbucket_core::{BucketStore, ControllerError, LogBucket, Record, Transport, UploadDecision, UploadStrategy};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Notify};

use crate::shutdown::ShutdownHandle;

/// How long the controller waits for a transport callback before treating a
/// dispensed bucket as timed out, independent of whatever deadline the
/// transport itself may apply internally.
const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of a single delivery attempt, marshalled back onto the
/// controller's single-tick context via an mpsc channel so a transport that
/// completes on an arbitrary thread never mutates `pending` directly.
enum DeliveryEvent {
    Delivered(i64),
    Failed(i64, String),
}

/// Binds a store, a strategy, and a transport, and drives the bucket
/// lifecycle: admitting records, dispensing buckets for delivery, and
/// reconciling commit/rollback outcomes.
pub struct UploadController {
    store: Arc<dyn BucketStore>,
    strategy: Arc<dyn UploadStrategy>,
    transport: Arc<dyn Transport>,
    delivery_timeout: Duration,
    pending: Mutex<HashMap<i64, Instant>>,
    immediate_tick: Notify,
    events_tx: mpsc::UnboundedSender<DeliveryEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<DeliveryEvent>>>,
    shutdown: ShutdownHandle,
}

impl UploadController {
    /// Builds a controller over the given collaborators, using
    /// [`DEFAULT_DELIVERY_TIMEOUT`] as the per-bucket delivery deadline.
    #[must_use]
    pub fn new(
        store: Arc<dyn BucketStore>,
        strategy: Arc<dyn UploadStrategy>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::with_delivery_timeout(store, strategy, transport, DEFAULT_DELIVERY_TIMEOUT)
    }

    /// Builds a controller with an explicit delivery timeout.
    #[must_use]
    pub fn with_delivery_timeout(
        store: Arc<dyn BucketStore>,
        strategy: Arc<dyn UploadStrategy>,
        transport: Arc<dyn Transport>,
        delivery_timeout: Duration,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            store,
            strategy,
            transport,
            delivery_timeout,
            pending: Mutex::new(HashMap::new()),
            immediate_tick: Notify::new(),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            shutdown: ShutdownHandle::new(),
        }
    }

    /// Returns a handle other tasks can use to request shutdown of [`run`](Self::run).
    #[must_use]
    pub fn shutdown_handle(&self) -> watch::Receiver<bool> {
        self.shutdown.receiver()
    }

    /// Requests that [`run`](Self::run) wind down after its current tick.
    pub fn trigger_shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Admits a record into the store. If the store's status now warrants an
    /// upload, wakes the tick loop immediately instead of waiting for the
    /// strategy's suggested delay.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Store`] if the store rejects the record.
    pub async fn log(&self, record: Record) -> Result<(), ControllerError> {
        self.store.add_record(record).await?;

        let status = self.store.status().await;
        if self.strategy.decide(status, Instant::now()) != UploadDecision::Noop {
            self.immediate_tick.notify_one();
        }
        Ok(())
    }

    /// Runs the tick loop until shutdown is triggered.
    ///
    /// Each iteration waits for whichever comes first: the strategy's
    /// suggested delay, an immediate-tick wakeup from [`log`](Self::log), a
    /// delivery event from an in-flight transport call, or the shutdown
    /// signal. On shutdown, outstanding deliveries are given one grace
    /// period to resolve before being rolled back.
    pub async fn run(&self) {
        let mut events_rx = self
            .events_rx
            .lock()
            .take()
            .expect("run() must only be called once per controller");
        let mut shutdown_rx = self.shutdown.receiver();

        loop {
            let delay = self.strategy.next_tick_delay();

            tokio::select! {
                () = tokio::time::sleep(delay) => {
                    self.tick().await;
                }
                () = self.immediate_tick.notified() => {
                    self.tick().await;
                }
                Some(event) = events_rx.recv() => {
                    self.handle_event(event).await;
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }

            self.sweep_timeouts().await;
        }

        self.drain(&mut events_rx).await;
    }

    /// Queries the strategy and acts on its decision once.
    ///
    /// Exposed directly so callers with their own scheduling loop (e.g. tests)
    /// can drive the controller without [`run`](Self::run)'s `select!`.
    pub async fn tick(&self) {
        let status = self.store.status().await;
        match self.strategy.decide(status, Instant::now()) {
            UploadDecision::Noop => {}
            UploadDecision::Upload => self.drain_uploads().await,
            UploadDecision::Cleanup => self.cleanup().await,
        }
    }

    async fn drain_uploads(&self) {
        while let Some(bucket) = self.store.next_bucket().await {
            self.dispatch(bucket);
        }
    }

    fn dispatch(&self, bucket: LogBucket) {
        let bucket_id = bucket.bucket_id;
        self.pending.lock().insert(bucket_id, Instant::now() + self.delivery_timeout);

        let transport = Arc::clone(&self.transport);
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = transport.send(bucket).await;
            let event = match outcome {
                logbucket_core::DeliveryOutcome::Delivered => DeliveryEvent::Delivered(bucket_id),
                logbucket_core::DeliveryOutcome::Failed(reason) => {
                    DeliveryEvent::Failed(bucket_id, reason.to_string())
                }
            };
            // The controller may already have shut down and dropped its
            // receiver; there is nothing more to do with the outcome then.
            let _ = events_tx.send(event);
        });
    }

    async fn cleanup(&self) {
        loop {
            let status = self.store.status().await;
            if self.strategy.decide(status, Instant::now()) != UploadDecision::Cleanup {
                break;
            }
            let Some(bucket) = self.store.next_bucket().await else {
                break;
            };
            self.store.remove_bucket(bucket.bucket_id).await;
            tracing::info!(bucket_id = bucket.bucket_id, "discarded bucket during cleanup");
        }
    }

    async fn handle_event(&self, event: DeliveryEvent) {
        match event {
            DeliveryEvent::Delivered(bucket_id) => {
                self.pending.lock().remove(&bucket_id);
                self.store.remove_bucket(bucket_id).await;
                self.strategy.on_success();
                tracing::debug!(bucket_id, "bucket delivered");
            }
            DeliveryEvent::Failed(bucket_id, reason) => {
                self.pending.lock().remove(&bucket_id);
                self.store.rollback_bucket(bucket_id).await;
                let delay = self.strategy.on_failure(&reason);
                tracing::warn!(bucket_id, reason, ?delay, "bucket delivery failed, rolled back");
            }
        }
    }

    /// Rolls back any dispensed bucket whose deadline has passed without a
    /// transport callback arriving, so a stalled or lost delivery cannot
    /// strand a bucket in `InUse` forever.
    async fn sweep_timeouts(&self) {
        let now = Instant::now();
        let expired: Vec<i64> = {
            let pending = self.pending.lock();
            pending
                .iter()
                .filter(|(_, deadline)| **deadline <= now)
                .map(|(id, _)| *id)
                .collect()
        };

        for bucket_id in expired {
            self.pending.lock().remove(&bucket_id);
            self.store.rollback_bucket(bucket_id).await;
            let delay = self.strategy.on_timeout(bucket_id);
            tracing::warn!(bucket_id, ?delay, "delivery timed out, rolled back");
        }
    }

    /// Resolves any still-outstanding deliveries on shutdown: drains buffered
    /// events for a grace period, then rolls back whatever remains pending.
    async fn drain(&self, events_rx: &mut mpsc::UnboundedReceiver<DeliveryEvent>) {
        let grace_period = Duration::from_millis(250);
        let deadline = Instant::now() + grace_period;

        while !self.pending.lock().is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::select! {
                Some(event) = events_rx.recv() => {
                    self.handle_event(event).await;
                }
                () = tokio::time::sleep(remaining) => {
                    break;
                }
            }
        }

        let stranded: Vec<i64> = self.pending.lock().keys().copied().collect();
        for bucket_id in stranded {
            self.pending.lock().remove(&bucket_id);
            self.store.rollback_bucket(bucket_id).await;
            tracing::warn!(bucket_id, "rolled back bucket still pending at shutdown");
        }
    }
}
