use crate::driver::DroneDriver;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Recurring video start request bound to a session
pub struct KeepAlive {
    token: CancellationToken,
    handle: JoinHandle<u64>,
}

impl KeepAlive {
    /// Start re-issuing `start_video` every `period`
    ///
    /// The task ends when `parent` or the keep-alive itself is cancelled.
    pub fn spawn(
        driver: Arc<dyn DroneDriver>,
        period: Duration,
        parent: &CancellationToken,
    ) -> Self {
        let token = parent.child_token();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick fires immediately; the router has just started video itself
            ticker.tick().await;

            let mut issued = 0u64;
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = driver.start_video().await {
                            warn!("Video keep-alive failed: {}", e);
                        }
                        issued += 1;
                    }
                }
            }

            debug!("Video keep-alive stopped after {} requests", issued);
            issued
        });

        Self { token, handle }
    }

    /// Cancel the schedule and wait for the task; returns the number of requests issued
    pub async fn stop(self) -> u64 {
        self.token.cancel();
        match self.handle.await {
            Ok(issued) => issued,
            Err(e) => {
                warn!("Video keep-alive task failed: {}", e);
                0
            }
        }
    }
}
