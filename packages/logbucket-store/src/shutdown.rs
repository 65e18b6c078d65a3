//! Cooperative shutdown signaling for the upload controller's tick loop.

use tokio::sync::watch;

/// Triggers and observes cooperative shutdown of an [`UploadController`](crate::controller::UploadController).
///
/// A thin wrapper around a `watch::Sender<bool>`: `trigger_shutdown` flips it
/// once, every tick-loop receiver observes the change on its next `select!`
/// and winds down rather than being killed mid-operation.
#[derive(Debug)]
pub struct ShutdownHandle {
    signal: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Creates a new, untriggered shutdown handle.
    #[must_use]
    pub fn new() -> Self {
        let (signal, _rx) = watch::channel(false);
        Self { signal }
    }

    /// Returns a receiver the tick loop selects on alongside its timers.
    #[must_use]
    pub fn receiver(&self) -> watch::Receiver<bool> {
        self.signal.subscribe()
    }

    /// Requests shutdown. Idempotent; ignores send errors from dropped receivers.
    pub fn trigger(&self) {
        let _ = self.signal.send(true);
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}
