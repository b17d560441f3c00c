use crate::frame::DecodedFrame;
use crate::relay::FrameReceiver;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Frame statistics gathered by the consumer
#[derive(Debug, Clone, Default)]
pub struct ConsumerStats {
    pub frames_received: u64,
    pub bytes_received: u64,
    pub last_frame_id: Option<u64>,
    pub first_frame_time: Option<Instant>,
    pub last_frame_time: Option<Instant>,
}

impl ConsumerStats {
    pub fn update_frame_stats(&mut self, frame: &DecodedFrame) {
        let now = Instant::now();
        self.frames_received += 1;
        self.bytes_received += frame.data.len() as u64;
        self.last_frame_id = Some(frame.id);
        self.first_frame_time.get_or_insert(now);
        self.last_frame_time = Some(now);
    }

    /// Average frame rate between the first and last frame seen
    pub fn average_fps(&self) -> f64 {
        match (self.first_frame_time, self.last_frame_time) {
            (Some(first), Some(last)) if self.frames_received > 1 => {
                let elapsed = last.duration_since(first).as_secs_f64();
                if elapsed > 0.0 {
                    (self.frames_received - 1) as f64 / elapsed
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }
}

/// Default downstream consumer: drains relayed frames and tracks frame rate
pub struct FrameConsumer {
    report_interval: Duration,
}

impl FrameConsumer {
    pub fn new(report_interval: Duration) -> Self {
        Self { report_interval }
    }

    /// Drain `frames` until the relay closes, then return the totals
    pub fn spawn(self, mut frames: FrameReceiver) -> JoinHandle<ConsumerStats> {
        tokio::spawn(async move {
            let mut stats = ConsumerStats::default();
            let mut last_report = Instant::now();

            while let Some(frame) = frames.recv().await {
                stats.update_frame_stats(&frame);
                debug!(
                    "Frame {} ({} bytes, {}ms old)",
                    frame.id,
                    frame.data.len(),
                    frame.age_ms()
                );

                if last_report.elapsed() >= self.report_interval {
                    info!(
                        "Video: {} frames, {:.1} fps",
                        stats.frames_received,
                        stats.average_fps()
                    );
                    last_report = Instant::now();
                }
            }

            debug!("Frame consumer finished after {} frames", stats.frames_received);
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SkycamConfig;
    use crate::frame::FrameFormat;
    use crate::relay::FrameRelay;

    #[tokio::test]
    async fn test_consumer_counts_until_relay_closes() {
        let (mut relay, frames) = FrameRelay::new(&SkycamConfig::default().relay);
        let handle = FrameConsumer::new(Duration::from_secs(60)).spawn(frames);

        for id in 0..3 {
            relay
                .relay(DecodedFrame::new(
                    id,
                    FrameFormat::H264AccessUnit,
                    960,
                    720,
                    vec![0u8; 10],
                ))
                .await;
        }
        drop(relay);

        let stats = handle.await.unwrap();
        assert_eq!(stats.frames_received, 3);
        assert_eq!(stats.bytes_received, 30);
        assert_eq!(stats.last_frame_id, Some(2));
    }

    #[test]
    fn test_fps_needs_two_frames() {
        let mut stats = ConsumerStats::default();
        assert_eq!(stats.average_fps(), 0.0);

        stats.update_frame_stats(&DecodedFrame::new(
            0,
            FrameFormat::H264AccessUnit,
            1,
            1,
            vec![0u8; 3],
        ));
        assert_eq!(stats.average_fps(), 0.0);
    }
}
