mod simulated;
mod synthetic;

pub use simulated::{ActuatorCall, SimulatedDriver, SimulationMode};
pub use synthetic::SyntheticStream;

use crate::error::DriverError;
use crate::events::EventSender;
use async_trait::async_trait;

/// Actuator and video control surface of a connected drone
///
/// A driver publishes [`DriverEvent`](crate::events::DriverEvent)s on the
/// sender it receives in [`connect`](DroneDriver::connect). Video packets must
/// be sent in wire arrival order; the recording depends on it.
#[async_trait]
pub trait DroneDriver: Send + Sync {
    /// Establish the control link and start publishing events
    async fn connect(&self, events: EventSender) -> Result<(), DriverError>;

    /// Stop publishing events and release the link
    async fn disconnect(&self) -> Result<(), DriverError> {
        Ok(())
    }

    /// Ask the drone to (re)start the video stream; safe to repeat
    async fn start_video(&self) -> Result<(), DriverError>;

    async fn set_video_encoder_rate(&self, rate: u8) -> Result<(), DriverError>;

    async fn take_off(&self) -> Result<(), DriverError>;
    async fn land(&self) -> Result<(), DriverError>;
    async fn clockwise(&self, angle: i32) -> Result<(), DriverError>;
    async fn counter_clockwise(&self, angle: i32) -> Result<(), DriverError>;
    async fn up(&self, distance: i32) -> Result<(), DriverError>;
    async fn down(&self, distance: i32) -> Result<(), DriverError>;
    async fn left(&self, distance: i32) -> Result<(), DriverError>;
    async fn right(&self, distance: i32) -> Result<(), DriverError>;
    async fn forward(&self, distance: i32) -> Result<(), DriverError>;
    async fn backward(&self, distance: i32) -> Result<(), DriverError>;
    async fn front_flip(&self) -> Result<(), DriverError>;
    async fn back_flip(&self) -> Result<(), DriverError>;
    async fn left_flip(&self) -> Result<(), DriverError>;
    async fn right_flip(&self) -> Result<(), DriverError>;
}
