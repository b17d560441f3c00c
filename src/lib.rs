pub mod app;
pub mod command;
pub mod config;
pub mod decoder;
pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod events;
pub mod frame;
pub mod recording;
pub mod relay;
pub mod router;
pub mod telemetry;

pub use app::{ShutdownHandle, ShutdownReason, SkycamOrchestrator};
pub use command::{command_channel, Command, CommandReceiver, CommandSender};
pub use config::SkycamConfig;
pub use decoder::{AccessUnitDecoder, VideoDecoder};
pub use dispatcher::CommandDispatcher;
pub use driver::{DroneDriver, SimulatedDriver, SimulationMode};
pub use error::{DecodeError, DriverError, RecordingError, Result, SkycamError};
pub use events::{DriverEvent, TelemetrySnapshot, VideoPacket};
pub use frame::{DecodedFrame, FrameFormat};
pub use recording::{RecordingSink, RecordingState};
pub use relay::{FrameRelay, RelayStats};
pub use router::{EventRouter, RouterStats, Session, SessionReport, SessionState};
pub use telemetry::TelemetryReporter;
