use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted by a drone driver, in emission order
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    /// The control link is up
    Connected,
    /// A flight data readout arrived
    Telemetry(TelemetrySnapshot),
    /// One unit of the compressed video stream arrived
    VideoPacket(VideoPacket),
}

impl DriverEvent {
    /// Get the event type as a string for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            DriverEvent::Connected => "connected",
            DriverEvent::Telemetry(_) => "telemetry",
            DriverEvent::VideoPacket(_) => "video_packet",
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            DriverEvent::Connected => "Connected".to_string(),
            DriverEvent::Telemetry(snapshot) => {
                format!("Flight data (battery {}%)", snapshot.battery_percentage)
            }
            DriverEvent::VideoPacket(packet) => format!("Video packet ({} bytes)", packet.len()),
        }
    }
}

/// Point-in-time flight status readout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub battery_percentage: u8,
    /// Height in decimetres
    pub height_dm: i16,
    pub hovering: bool,
    pub in_sky: bool,
    pub on_ground: bool,
    pub em_open: bool,
    pub wifi_strength: u8,
}

impl TelemetrySnapshot {
    /// Height in metres
    pub fn height_m(&self) -> f32 {
        f32::from(self.height_dm) / 10.0
    }
}

/// Opaque chunk of the raw compressed video stream
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoPacket(Bytes);

impl VideoPacket {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for VideoPacket {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&'static [u8]> for VideoPacket {
    fn from(data: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(data))
    }
}

pub type EventSender = mpsc::Sender<DriverEvent>;
pub type EventReceiver = mpsc::Receiver<DriverEvent>;

/// Create the ordered channel a driver publishes its events on
///
/// The channel is bounded: a driver that outruns the router waits instead of
/// dropping packets.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_properties() {
        let packet = DriverEvent::VideoPacket(VideoPacket::from(vec![0u8, 0, 1, 0x65]));
        assert_eq!(packet.event_type(), "video_packet");
        assert!(packet.description().contains("4 bytes"));

        let telemetry = DriverEvent::Telemetry(TelemetrySnapshot {
            battery_percentage: 77,
            ..Default::default()
        });
        assert_eq!(telemetry.event_type(), "telemetry");
        assert!(telemetry.description().contains("77%"));
    }

    #[test]
    fn test_height_conversion() {
        let snapshot = TelemetrySnapshot {
            height_dm: 12,
            ..Default::default()
        };
        assert!((snapshot.height_m() - 1.2).abs() < f32::EPSILON);
    }
}
