use std::time::Duration;

use log::{debug, error};
use tokio::{task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use super::{controller::WorkTracker, state::CurrentStatus};

/// Periodically recomputes a user's status for a live display. The status is
/// always read fresh from the store; nothing is cached between ticks.
/// Dropping the handle detaches the task; use [`StatusTicker::stop`].
pub struct StatusTicker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl StatusTicker {
    /// Fires once immediately, then every `every`. Stops by itself after
    /// reporting a status with no running session.
    pub fn spawn<F>(tracker: WorkTracker, user_id: i64, every: Duration, on_refresh: F) -> Self
    where
        F: Fn(CurrentStatus) + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(every);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Status ticker for user {} cancelled", user_id);
                        break;
                    }
                    _ = interval.tick() => {}
                }

                match tracker.get_current_status(user_id).await {
                    Ok(status) => {
                        let working = status.is_working;
                        on_refresh(status);
                        if !working {
                            debug!("User {} has no running session; ticker stopping", user_id);
                            break;
                        }
                    }
                    Err(err) => {
                        error!("Failed to refresh status for user {}: {:#}", user_id, err);
                    }
                }
            }
        });

        Self { cancel, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancels the ticker and waits for it to wind down.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            if !err.is_cancelled() {
                error!("Status ticker panicked: {err}");
            }
        }
    }
}
