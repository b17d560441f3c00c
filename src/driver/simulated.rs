use super::{DroneDriver, SyntheticStream};
use crate::config::DriverConfig;
use crate::error::DriverError;
use crate::events::{DriverEvent, EventSender, TelemetrySnapshot};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Calls a driver received, in the order received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    StartVideo,
    SetVideoEncoderRate(u8),
    TakeOff,
    Land,
    Clockwise(i32),
    CounterClockwise(i32),
    Up(i32),
    Down(i32),
    Left(i32),
    Right(i32),
    Forward(i32),
    Backward(i32),
    FrontFlip,
    BackFlip,
    LeftFlip,
    RightFlip,
}

impl ActuatorCall {
    pub fn name(&self) -> &'static str {
        match self {
            ActuatorCall::StartVideo => "start_video",
            ActuatorCall::SetVideoEncoderRate(_) => "set_video_encoder_rate",
            ActuatorCall::TakeOff => "take_off",
            ActuatorCall::Land => "land",
            ActuatorCall::Clockwise(_) => "clockwise",
            ActuatorCall::CounterClockwise(_) => "counter_clockwise",
            ActuatorCall::Up(_) => "up",
            ActuatorCall::Down(_) => "down",
            ActuatorCall::Left(_) => "left",
            ActuatorCall::Right(_) => "right",
            ActuatorCall::Forward(_) => "forward",
            ActuatorCall::Backward(_) => "backward",
            ActuatorCall::FrontFlip => "front_flip",
            ActuatorCall::BackFlip => "back_flip",
            ActuatorCall::LeftFlip => "left_flip",
            ActuatorCall::RightFlip => "right_flip",
        }
    }
}

/// How a simulated driver produces events after `connect`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationMode {
    /// Emit `Connected`, then telemetry and synthetic video on timers
    Generated,
    /// Emit nothing on its own; events are pushed with [`SimulatedDriver::emit`]
    Manual,
}

#[derive(Debug, Default)]
struct FlightState {
    airborne: bool,
    height_dm: i16,
    battery: u8,
}

/// In-process drone used when no hardware link is available
pub struct SimulatedDriver {
    config: DriverConfig,
    mode: SimulationMode,
    calls: Arc<Mutex<Vec<ActuatorCall>>>,
    flight: Arc<Mutex<FlightState>>,
    failing_actions: Mutex<HashSet<&'static str>>,
    events: Mutex<Option<EventSender>>,
    generator_task: Mutex<Option<JoinHandle<()>>>,
    cancellation_token: CancellationToken,
}

impl SimulatedDriver {
    pub fn new(config: DriverConfig, mode: SimulationMode) -> Self {
        Self {
            config,
            mode,
            calls: Arc::new(Mutex::new(Vec::new())),
            flight: Arc::new(Mutex::new(FlightState {
                battery: 100,
                ..Default::default()
            })),
            failing_actions: Mutex::new(HashSet::new()),
            events: Mutex::new(None),
            generator_task: Mutex::new(None),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Manual-mode driver with default timings, for tests
    pub fn manual() -> Self {
        Self::new(
            DriverConfig {
                port: 0,
                packet_interval_ms: 33,
                telemetry_interval_ms: 1000,
            },
            SimulationMode::Manual,
        )
    }

    /// Make every call of the named action fail
    pub fn fail_action(&self, action: &'static str) {
        self.failing_actions.lock().insert(action);
    }

    /// All calls received so far
    pub fn calls(&self) -> Vec<ActuatorCall> {
        self.calls.lock().clone()
    }

    /// Calls received so far, excluding the video keep-alive traffic
    pub fn actuator_calls(&self) -> Vec<ActuatorCall> {
        self.calls
            .lock()
            .iter()
            .copied()
            .filter(|call| {
                !matches!(
                    call,
                    ActuatorCall::StartVideo | ActuatorCall::SetVideoEncoderRate(_)
                )
            })
            .collect()
    }

    pub fn is_connected(&self) -> bool {
        self.events.lock().is_some()
    }

    /// Push an event to the router as if it came off the wire
    pub async fn emit(&self, event: DriverEvent) -> Result<(), DriverError> {
        let sender = self
            .events
            .lock()
            .clone()
            .ok_or(DriverError::NotConnected)?;
        sender
            .send(event)
            .await
            .map_err(|_| DriverError::EventChannelClosed)
    }

    fn record(&self, call: ActuatorCall) -> Result<(), DriverError> {
        if self.events.lock().is_none() {
            return Err(DriverError::NotConnected);
        }

        self.calls.lock().push(call);

        if self.failing_actions.lock().contains(call.name()) {
            return Err(DriverError::Actuator {
                action: call.name().to_string(),
                details: "simulated failure".to_string(),
            });
        }

        self.apply(call);
        Ok(())
    }

    fn apply(&self, call: ActuatorCall) {
        let mut flight = self.flight.lock();
        match call {
            ActuatorCall::TakeOff => {
                flight.airborne = true;
                flight.height_dm = 8;
            }
            ActuatorCall::Land => {
                flight.airborne = false;
                flight.height_dm = 0;
            }
            ActuatorCall::Up(cm) if flight.airborne => {
                flight.height_dm = flight.height_dm.saturating_add((cm / 10) as i16);
            }
            ActuatorCall::Down(cm) if flight.airborne => {
                flight.height_dm = flight.height_dm.saturating_sub((cm / 10) as i16).max(0);
            }
            _ => {}
        }
    }

    fn spawn_generator(&self, events: EventSender) -> JoinHandle<()> {
        let token = self.cancellation_token.clone();
        let flight = Arc::clone(&self.flight);
        let packet_interval = self.config.packet_interval();
        let telemetry_interval = self.config.telemetry_interval();

        tokio::spawn(async move {
            // Link setup latency
            tokio::time::sleep(Duration::from_millis(50)).await;
            if events.send(DriverEvent::Connected).await.is_err() {
                return;
            }

            let mut stream = SyntheticStream::new(30, 1460);
            let mut packets = tokio::time::interval(packet_interval);
            let mut telemetry = tokio::time::interval(telemetry_interval);

            loop {
                let event = tokio::select! {
                    _ = token.cancelled() => break,
                    _ = packets.tick() => DriverEvent::VideoPacket(stream.next_packet()),
                    _ = telemetry.tick() => DriverEvent::Telemetry(flight_snapshot(&flight)),
                };

                tokio::select! {
                    _ = token.cancelled() => break,
                    sent = events.send(event) => {
                        if sent.is_err() {
                            debug!("Simulated driver event channel closed");
                            break;
                        }
                    }
                }
            }

            debug!(
                "Simulated driver generator exited after {} frames",
                stream.frames_generated()
            );
        })
    }
}

fn flight_snapshot(flight: &Mutex<FlightState>) -> TelemetrySnapshot {
    let mut state = flight.lock();
    state.battery = state.battery.saturating_sub(u8::from(state.airborne));
    TelemetrySnapshot {
        battery_percentage: state.battery,
        height_dm: state.height_dm,
        hovering: state.airborne,
        in_sky: state.airborne,
        on_ground: !state.airborne,
        em_open: false,
        wifi_strength: 90,
    }
}

#[async_trait]
impl DroneDriver for SimulatedDriver {
    async fn connect(&self, events: EventSender) -> Result<(), DriverError> {
        if self.is_connected() {
            return Err(DriverError::Connect {
                details: "already connected".to_string(),
            });
        }

        info!(
            "Simulated driver connecting on port {} ({:?} mode)",
            self.config.port, self.mode
        );

        if self.mode == SimulationMode::Generated {
            let task = self.spawn_generator(events.clone());
            *self.generator_task.lock() = Some(task);
        }

        *self.events.lock() = Some(events);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DriverError> {
        self.cancellation_token.cancel();
        let task = self.generator_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Simulated driver generator task failed: {}", e);
            }
        }
        self.events.lock().take();
        info!("Simulated driver disconnected");
        Ok(())
    }

    async fn start_video(&self) -> Result<(), DriverError> {
        self.record(ActuatorCall::StartVideo)
    }

    async fn set_video_encoder_rate(&self, rate: u8) -> Result<(), DriverError> {
        self.record(ActuatorCall::SetVideoEncoderRate(rate))
    }

    async fn take_off(&self) -> Result<(), DriverError> {
        self.record(ActuatorCall::TakeOff)
    }

    async fn land(&self) -> Result<(), DriverError> {
        self.record(ActuatorCall::Land)
    }

    async fn clockwise(&self, angle: i32) -> Result<(), DriverError> {
        self.record(ActuatorCall::Clockwise(angle))
    }

    async fn counter_clockwise(&self, angle: i32) -> Result<(), DriverError> {
        self.record(ActuatorCall::CounterClockwise(angle))
    }

    async fn up(&self, distance: i32) -> Result<(), DriverError> {
        self.record(ActuatorCall::Up(distance))
    }

    async fn down(&self, distance: i32) -> Result<(), DriverError> {
        self.record(ActuatorCall::Down(distance))
    }

    async fn left(&self, distance: i32) -> Result<(), DriverError> {
        self.record(ActuatorCall::Left(distance))
    }

    async fn right(&self, distance: i32) -> Result<(), DriverError> {
        self.record(ActuatorCall::Right(distance))
    }

    async fn forward(&self, distance: i32) -> Result<(), DriverError> {
        self.record(ActuatorCall::Forward(distance))
    }

    async fn backward(&self, distance: i32) -> Result<(), DriverError> {
        self.record(ActuatorCall::Backward(distance))
    }

    async fn front_flip(&self) -> Result<(), DriverError> {
        self.record(ActuatorCall::FrontFlip)
    }

    async fn back_flip(&self) -> Result<(), DriverError> {
        self.record(ActuatorCall::BackFlip)
    }

    async fn left_flip(&self) -> Result<(), DriverError> {
        self.record(ActuatorCall::LeftFlip)
    }

    async fn right_flip(&self) -> Result<(), DriverError> {
        self.record(ActuatorCall::RightFlip)
    }
}
