use tokio::sync::watch;

use crate::error::MetricError;

/// Settlement of one flush cycle, fanned out to every waiter.
pub(crate) type BatchResult = Result<(), MetricError>;

/// Completion side of the single pending flush of a metric's buffer.
///
/// At most one cycle exists per metric at a time. Every report landing in the
/// open window subscribes a [`FlushWaiter`] to it, so concurrent callers
/// observe the same settlement once the batch send finishes.
pub(crate) struct FlushCycle {
    id: u64,
    tx: watch::Sender<Option<BatchResult>>,
}

pub(crate) struct FlushWaiter {
    rx: watch::Receiver<Option<BatchResult>>,
}

impl FlushCycle {
    pub(crate) fn new(id: u64) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { id, tx }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn waiter(&self) -> FlushWaiter {
        FlushWaiter {
            rx: self.tx.subscribe(),
        }
    }

    /// Broadcasts the batch result to all waiters and closes the cycle.
    pub(crate) fn complete(self, result: BatchResult) {
        let _ = self.tx.send(Some(result));
    }
}

impl FlushWaiter {
    /// Waits for the cycle's settlement.
    ///
    /// A cycle abandoned by `clear_timers` is kept open without ever being
    /// completed, in which case this future stays pending for the rest of the
    /// process lifetime. That is the documented contract of forced timer
    /// teardown, not an error path.
    pub(crate) async fn wait(mut self) -> BatchResult {
        loop {
            if let Some(result) = self.rx.borrow_and_update().as_ref().cloned() {
                return result;
            }

            if self.rx.changed().await.is_err() {
                // Cycle dropped without a settlement: stay unsettled.
                std::future::pending::<()>().await;
            }
        }
    }
}
