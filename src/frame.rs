use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Payload format of a relayed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// One complete coded H.264 access unit (Annex-B)
    H264AccessUnit,
}

/// A frame produced by a video decoder
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    /// Sequence number assigned by the decoder
    pub id: u64,
    /// Time the frame was completed
    pub timestamp: SystemTime,
    pub format: FrameFormat,
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

impl DecodedFrame {
    pub fn new(
        id: u64,
        format: FrameFormat,
        width: u32,
        height: u32,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            id,
            timestamp: SystemTime::now(),
            format,
            width,
            height,
            data: data.into(),
        }
    }

    /// Get frame age in milliseconds
    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_frame_age() {
        let mut frame =
            DecodedFrame::new(3, FrameFormat::H264AccessUnit, 960, 720, vec![0, 0, 1, 0x65]);
        assert!(frame.age_ms() < 1_000);

        frame.timestamp -= Duration::from_millis(250);
        assert!(frame.age_ms() >= 250);
    }
}
