//! Cancellable periodic background tasks

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// A background task that runs an async action on a fixed interval until
/// cancelled.
///
/// The first run happens one full `period` after spawning. The task stops
/// when its own token or the parent token is cancelled, or when the handle
/// is dropped.
#[derive(Debug)]
pub struct PeriodicTask {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn `action` to run every `period`.
    ///
    /// `action` returns `false` to stop the task on its own.
    pub fn spawn<F, Fut>(
        name: &'static str,
        period: Duration,
        parent: &CancellationToken,
        mut action: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let cancel = parent.child_token();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::debug!("Periodic task '{}' started (every {:?})", name, period);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if !action().await {
                            tracing::debug!("Periodic task '{}' finished", name);
                            break;
                        }
                    }
                    _ = task_cancel.cancelled() => {
                        tracing::debug!("Periodic task '{}' cancelled", name);
                        break;
                    }
                }
            }
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Whether the task has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel and wait for the task to exit
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::warn!("Periodic task panicked: {}", e);
                }
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
