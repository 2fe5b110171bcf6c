use std::future::Future;
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::sleep;

/// Cancelable one-shot delay.
///
/// Resolves once after the configured duration and then runs `on_fire`, or
/// does nothing at all if cancelled before firing.
pub(crate) struct FlushTimer {
    handle: AbortHandle,
}

impl FlushTimer {
    pub(crate) fn arm<F>(delay: Duration, on_fire: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            sleep(delay).await;
            on_fire.await;
        });

        Self {
            handle: task.abort_handle(),
        }
    }

    pub(crate) fn cancel(&self) {
        self.handle.abort();
    }
}
