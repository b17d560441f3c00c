use crate::config::{RelayConfig, RelayPolicy};
use crate::frame::DecodedFrame;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub type FrameReceiver = mpsc::Receiver<DecodedFrame>;

/// Statistics for frame delivery to the consumer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub frames_relayed: u64,
    pub frames_dropped: u64,
    pub bytes_relayed: u64,
}

impl RelayStats {
    pub fn efficiency(&self) -> f64 {
        let total = self.frames_relayed + self.frames_dropped;
        if total > 0 {
            self.frames_relayed as f64 / total as f64
        } else {
            1.0
        }
    }
}

/// Result of handing one frame to the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered,
    /// Buffer full under [`RelayPolicy::DropNewest`]
    Dropped,
    /// The consumer hung up; the frame was discarded
    ConsumerClosed,
    /// Shutdown was requested before the frame could be handed off
    Cancelled,
}

/// Ordered handoff of decoded frames to a single consumer
///
/// Under [`RelayPolicy::Block`] `relay` waits for buffer space, which stalls
/// the caller (the router) while the consumer is behind.
pub struct FrameRelay {
    sender: mpsc::Sender<DecodedFrame>,
    policy: RelayPolicy,
    stats: RelayStats,
    consumer_closed: bool,
}

impl FrameRelay {
    /// Create the relay and the receiving end for the consumer
    pub fn new(config: &RelayConfig) -> (Self, FrameReceiver) {
        let (sender, receiver) = mpsc::channel(config.capacity);
        let relay = Self {
            sender,
            policy: config.policy,
            stats: RelayStats::default(),
            consumer_closed: false,
        };
        (relay, receiver)
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    pub fn policy(&self) -> RelayPolicy {
        self.policy
    }

    pub async fn relay(&mut self, frame: DecodedFrame) -> RelayOutcome {
        if self.consumer_closed {
            self.stats.frames_dropped += 1;
            return RelayOutcome::ConsumerClosed;
        }

        let size = frame.data.len() as u64;
        let outcome = match self.policy {
            RelayPolicy::Block => match self.sender.send(frame).await {
                Ok(()) => RelayOutcome::Delivered,
                Err(_) => RelayOutcome::ConsumerClosed,
            },
            RelayPolicy::DropNewest => match self.sender.try_send(frame) {
                Ok(()) => RelayOutcome::Delivered,
                Err(mpsc::error::TrySendError::Full(dropped)) => {
                    debug!("Frame relay full, dropping frame {}", dropped.id);
                    RelayOutcome::Dropped
                }
                Err(mpsc::error::TrySendError::Closed(_)) => RelayOutcome::ConsumerClosed,
            },
        };

        match outcome {
            RelayOutcome::Delivered => {
                self.stats.frames_relayed += 1;
                self.stats.bytes_relayed += size;
            }
            RelayOutcome::Dropped | RelayOutcome::Cancelled => self.stats.frames_dropped += 1,
            RelayOutcome::ConsumerClosed => {
                warn!("Frame consumer closed; discarding decoded frames from now on");
                self.consumer_closed = true;
                self.stats.frames_dropped += 1;
            }
        }

        outcome
    }

    /// Relay `frame`, giving up if `shutdown` fires while the handoff waits
    pub async fn relay_until(
        &mut self,
        frame: DecodedFrame,
        shutdown: &CancellationToken,
    ) -> RelayOutcome {
        let outcome = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            outcome = self.relay(frame) => Some(outcome),
        };

        match outcome {
            Some(outcome) => outcome,
            None => {
                debug!("Frame handoff abandoned on shutdown");
                self.stats.frames_dropped += 1;
                RelayOutcome::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameFormat;
    use std::time::Duration;
    use tokio::time::timeout;

    fn frame(id: u64) -> DecodedFrame {
        DecodedFrame::new(id, FrameFormat::H264AccessUnit, 960, 720, vec![0, 0, 1, 0x65])
    }

    fn config(capacity: usize, policy: RelayPolicy) -> RelayConfig {
        RelayConfig { capacity, policy }
    }

    #[tokio::test]
    async fn test_blocking_relay_waits_for_consumer() {
        let (mut relay, mut receiver) = FrameRelay::new(&config(1, RelayPolicy::Block));

        assert_eq!(relay.relay(frame(0)).await, RelayOutcome::Delivered);

        // Buffer is full: the second handoff must wait
        let pending = timeout(Duration::from_millis(50), relay.relay(frame(1))).await;
        assert!(pending.is_err());

        assert_eq!(receiver.recv().await.unwrap().id, 0);
        assert_eq!(relay.relay(frame(2)).await, RelayOutcome::Delivered);
        assert_eq!(receiver.recv().await.unwrap().id, 2);
        assert_eq!(relay.stats().frames_dropped, 0);
    }

    #[tokio::test]
    async fn test_drop_newest_when_full() {
        let (mut relay, mut receiver) = FrameRelay::new(&config(2, RelayPolicy::DropNewest));

        for id in 0..4 {
            relay.relay(frame(id)).await;
        }

        assert_eq!(receiver.recv().await.unwrap().id, 0);
        assert_eq!(receiver.recv().await.unwrap().id, 1);
        assert!(receiver.try_recv().is_err());

        let stats = relay.stats();
        assert_eq!(stats.frames_relayed, 2);
        assert_eq!(stats.frames_dropped, 2);
        assert!((stats.efficiency() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_closed_consumer_is_not_fatal() {
        let (mut relay, receiver) = FrameRelay::new(&config(4, RelayPolicy::Block));
        drop(receiver);

        assert_eq!(relay.relay(frame(0)).await, RelayOutcome::ConsumerClosed);
        assert_eq!(relay.relay(frame(1)).await, RelayOutcome::ConsumerClosed);
        assert_eq!(relay.stats().frames_dropped, 2);
    }

    #[tokio::test]
    async fn test_blocked_handoff_gives_up_on_shutdown() {
        let (mut relay, mut receiver) = FrameRelay::new(&config(1, RelayPolicy::Block));
        let shutdown = CancellationToken::new();

        assert_eq!(
            relay.relay_until(frame(0), &shutdown).await,
            RelayOutcome::Delivered
        );

        let cancel = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let outcome = timeout(Duration::from_secs(2), relay.relay_until(frame(1), &shutdown))
            .await
            .expect("handoff ignored shutdown");
        assert_eq!(outcome, RelayOutcome::Cancelled);

        assert_eq!(receiver.recv().await.unwrap().id, 0);
        assert!(receiver.try_recv().is_err());
        assert_eq!(relay.stats().frames_relayed, 1);
        assert_eq!(relay.stats().frames_dropped, 1);
    }
}
