//! Cancellable periodic task.
//!
//! Follow pursuit and the stall watchdog both run a short async tick on a
//! fixed interval until they are torn down. [`PeriodicTask`] owns the
//! spawned loop and its cancellation token; dropping it stops the loop.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Handle to a spawned loop that calls a tick function every `period`.
pub struct PeriodicTask {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn `tick` every `period`, starting after the first period elapses.
    ///
    /// A tick that overruns its period delays the next one rather than
    /// bursting to catch up.
    pub fn spawn<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = child.cancelled() => break,
                    _ = interval.tick() => {}
                }
                tokio::select! {
                    biased;
                    _ = child.cancelled() => break,
                    _ = tick() => {}
                }
            }
        });
        Self {
            token,
            handle: Some(handle),
        }
    }

    /// Token observed by the loop; cancelling it stops the task.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
            && self
                .handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the loop. An in-flight tick is dropped at its next await.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
