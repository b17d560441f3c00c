use super::consumer::FrameConsumer;
use super::keyboard_input::KeyboardCommandSource;
use super::{ComponentState, SkycamOrchestrator};
use crate::command::CommandReceiver;
use crate::decoder::AccessUnitDecoder;
use crate::error::{Result, SkycamError};
use crate::events::EventReceiver;
use crate::router::{EventRouter, Session};
use std::time::Duration;
use tracing::{error, info};

/// Camera resolution of the video stream
const FRAME_WIDTH: u32 = 960;
const FRAME_HEIGHT: u32 = 720;

const CONSUMER_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Everything the control loop needs once startup succeeded
pub(super) struct StartedSession {
    pub router: EventRouter,
    pub commands: CommandReceiver,
    pub events: EventReceiver,
}

impl SkycamOrchestrator {
    /// Open the recording, connect the driver and wire the router
    ///
    /// The recording is created first; if that fails the driver is never
    /// touched.
    pub(super) async fn start(&mut self) -> Result<StartedSession> {
        info!("Starting skycam session");

        let commands = self
            .command_rx
            .take()
            .ok_or_else(|| SkycamError::system("Session already started"))?;

        self.set_component_state("recording", ComponentState::Starting)
            .await;
        let session = match Session::open(&self.config, self.driver.clone()).await {
            Ok(session) => session,
            Err(e) => {
                self.set_component_state("recording", ComponentState::Failed)
                    .await;
                return Err(e.into());
            }
        };
        self.set_component_state("recording", ComponentState::Running)
            .await;

        self.set_component_state("driver", ComponentState::Starting)
            .await;
        let events = match session
            .connect(self.config.system.event_queue_capacity)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                error!("Failed to connect driver: {}", e);
                self.set_component_state("driver", ComponentState::Failed)
                    .await;
                return Err(e.into());
            }
        };
        self.set_component_state("driver", ComponentState::Running)
            .await;

        let decoder = Box::new(AccessUnitDecoder::new(FRAME_WIDTH, FRAME_HEIGHT));
        let (router, frames) =
            EventRouter::new(session, &self.config, decoder, self.shutdown.token());

        self.consumer = Some(FrameConsumer::new(CONSUMER_REPORT_INTERVAL).spawn(frames));
        self.set_component_state("consumer", ComponentState::Running)
            .await;

        if self.keyboard_enabled {
            if let Some(sender) = self.commands.clone() {
                let mut keyboard = KeyboardCommandSource::new(sender, self.shutdown.clone());
                keyboard.start()?;
                self.keyboard = Some(keyboard);
                self.set_component_state("keyboard", ComponentState::Running)
                    .await;
            }
        }

        Ok(StartedSession {
            router,
            commands,
            events,
        })
    }
}
