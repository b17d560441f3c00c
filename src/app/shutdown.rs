use super::types::ShutdownReason;
use super::{ComponentState, SkycamOrchestrator};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Shared trigger for ending the session
///
/// The first reason recorded wins; later requests only re-cancel.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    token: CancellationToken,
    reason: Arc<Mutex<Option<ShutdownReason>>>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, reason: ShutdownReason) {
        {
            let mut slot = self.reason.lock();
            if slot.is_none() {
                info!("Shutdown requested: {:?}", reason);
                *slot = Some(reason);
            }
        }
        self.token.cancel();
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.lock().clone()
    }

    /// Token cancelled on the first request
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl SkycamOrchestrator {
    /// Stop the components that outlive the router
    pub async fn shutdown(&mut self) {
        info!("Beginning graceful shutdown");

        if let Some(mut keyboard) = self.keyboard.take() {
            self.set_component_state("keyboard", ComponentState::Stopping)
                .await;
            match timeout(Duration::from_secs(2), keyboard.stop()).await {
                Ok(Ok(())) => {
                    self.set_component_state("keyboard", ComponentState::Stopped)
                        .await
                }
                Ok(Err(e)) => {
                    error!("Error stopping keyboard: {}", e);
                    self.set_component_state("keyboard", ComponentState::Failed)
                        .await;
                }
                Err(_) => {
                    error!("keyboard component stop timeout");
                    self.set_component_state("keyboard", ComponentState::Failed)
                        .await;
                }
            }
        }

        // The consumer ends once the router has released the relay
        if let Some(consumer) = self.consumer.take() {
            self.set_component_state("consumer", ComponentState::Stopping)
                .await;
            match timeout(Duration::from_secs(5), consumer).await {
                Ok(Ok(stats)) => {
                    info!(
                        "Frame consumer received {} frames ({:.1} fps average)",
                        stats.frames_received,
                        stats.average_fps()
                    );
                    self.set_component_state("consumer", ComponentState::Stopped)
                        .await;
                }
                Ok(Err(e)) => {
                    error!("Frame consumer task failed: {}", e);
                    self.set_component_state("consumer", ComponentState::Failed)
                        .await;
                }
                Err(_) => {
                    warn!("Frame consumer did not finish in time");
                    self.set_component_state("consumer", ComponentState::Failed)
                        .await;
                }
            }
        }

        info!(
            "Graceful shutdown completed ({:?})",
            self.shutdown.reason()
        );
    }
}
