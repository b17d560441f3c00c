mod keepalive;
mod session;


pub use keepalive::KeepAlive;
pub use session::{Session, SessionReport};

use crate::command::{Command, CommandReceiver};
use crate::config::{SkycamConfig, VideoConfig};
use crate::decoder::VideoDecoder;
use crate::dispatcher::CommandDispatcher;
use crate::error::Result;
use crate::events::{DriverEvent, EventReceiver, TelemetrySnapshot, VideoPacket};
use crate::frame::DecodedFrame;
use crate::relay::{FrameReceiver, FrameRelay, RelayOutcome};
use crate::telemetry::TelemetryReporter;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Link state as tracked by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Streaming,
}

/// Session counters kept by the router
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub commands_dispatched: u64,
    pub commands_failed: u64,
    pub packets_received: u64,
    pub frames_decoded: u64,
    pub decode_failures: u64,
    pub telemetry_reports: u64,
}

enum LoopInput {
    Shutdown,
    Command(Option<Command>),
    Event(Option<DriverEvent>),
}

/// Single control loop multiplexing driver events and commands
///
/// Each iteration services exactly one ready input. Preference alternates
/// between the command queue and the driver event queue on every iteration,
/// so neither starves while the other stays busy. A shutdown request is
/// checked before both.
pub struct EventRouter {
    session: Session,
    dispatcher: CommandDispatcher,
    decoder: Box<dyn VideoDecoder>,
    relay: FrameRelay,
    reporter: TelemetryReporter,
    video: VideoConfig,
    state: watch::Sender<SessionState>,
    stats: RouterStats,
    prefer_commands: bool,
    shutdown: CancellationToken,
}

impl EventRouter {
    pub fn new(
        session: Session,
        config: &SkycamConfig,
        decoder: Box<dyn VideoDecoder>,
        shutdown: CancellationToken,
    ) -> (Self, FrameReceiver) {
        let (relay, frames) = FrameRelay::new(&config.relay);
        let (state, _) = watch::channel(SessionState::Disconnected);
        let router = Self {
            dispatcher: CommandDispatcher::new(session.driver()),
            session,
            decoder,
            relay,
            reporter: TelemetryReporter::new(),
            video: config.video.clone(),
            state,
            stats: RouterStats::default(),
            prefer_commands: true,
            shutdown,
        };
        (router, frames)
    }

    /// Watch link state changes
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Run until shutdown, until both inputs close, or until a fatal error
    ///
    /// The session is torn down on every exit path; a fatal error is returned
    /// after teardown.
    pub async fn run(
        mut self,
        mut commands: CommandReceiver,
        mut events: EventReceiver,
    ) -> Result<SessionReport> {
        info!("Event router running for session {}", self.session.id());

        let outcome = self.run_loop(&mut commands, &mut events).await;

        // Nothing queued is processed after this point
        commands.close();
        events.close();

        let dispatched = self.dispatcher.stats();
        let stats = RouterStats {
            commands_dispatched: dispatched.dispatched,
            commands_failed: dispatched.failed,
            ..self.stats
        };
        let relay = self.relay.stats();
        let report = self.session.teardown(stats, relay).await;

        match outcome {
            Ok(()) => report,
            Err(e) => {
                if let Err(teardown) = report {
                    error!("Session teardown after fatal error also failed: {}", teardown);
                }
                Err(e)
            }
        }
    }

    async fn run_loop(
        &mut self,
        commands: &mut CommandReceiver,
        events: &mut EventReceiver,
    ) -> Result<()> {
        let mut commands_open = true;
        let mut events_open = true;

        while commands_open || events_open {
            let input = if self.prefer_commands {
                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => LoopInput::Shutdown,
                    command = commands.recv(), if commands_open => LoopInput::Command(command),
                    event = events.recv(), if events_open => LoopInput::Event(event),
                }
            } else {
                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => LoopInput::Shutdown,
                    event = events.recv(), if events_open => LoopInput::Event(event),
                    command = commands.recv(), if commands_open => LoopInput::Command(command),
                }
            };
            self.prefer_commands = !self.prefer_commands;

            match input {
                LoopInput::Shutdown => {
                    info!("Event router shutting down");
                    return Ok(());
                }
                LoopInput::Command(Some(command)) => self.on_command(command).await,
                LoopInput::Command(None) => {
                    debug!("Command queue closed");
                    commands_open = false;
                }
                LoopInput::Event(Some(event)) => self.on_event(event).await?,
                LoopInput::Event(None) => {
                    warn!("Driver event stream closed");
                    events_open = false;
                    self.flush_decoder().await;
                }
            }
        }

        info!("All router inputs closed");
        Ok(())
    }

    async fn on_command(&mut self, command: Command) {
        match self.dispatcher.dispatch(command).await {
            Ok(()) => {}
            // Already logged and counted by the dispatcher
            Err(e) => debug!("Continuing after failed '{}': {}", command.name(), e),
        }
    }

    async fn on_event(&mut self, event: DriverEvent) -> Result<()> {
        debug!(event = event.event_type(), "{}", event.description());
        match event {
            DriverEvent::Connected => self.on_connected().await,
            DriverEvent::Telemetry(snapshot) => self.on_telemetry(&snapshot),
            DriverEvent::VideoPacket(packet) => self.on_video_packet(packet).await?,
        }
        Ok(())
    }

    async fn on_connected(&mut self) {
        if self.state() != SessionState::Disconnected {
            warn!("Ignoring repeated connected event");
            return;
        }

        info!("Connected");
        self.state.send_replace(SessionState::Connected);

        let driver = self.session.driver();
        if let Err(e) = driver.start_video().await {
            warn!("Failed to start video: {}", e);
        }
        if let Err(e) = driver.set_video_encoder_rate(self.video.encoder_rate).await {
            warn!("Failed to set video encoder rate: {}", e);
        }

        self.session
            .start_keepalive(self.video.keepalive_interval(), &self.shutdown);
        debug!(
            "Video keep-alive every {:?} (running: {})",
            self.video.keepalive_interval(),
            self.session.keepalive_running()
        );

        self.state.send_replace(SessionState::Streaming);
    }

    fn on_telemetry(&mut self, snapshot: &TelemetrySnapshot) {
        self.reporter.report(snapshot);
        self.stats.telemetry_reports += 1;
    }

    async fn on_video_packet(&mut self, packet: VideoPacket) -> Result<()> {
        self.stats.packets_received += 1;

        // Durable before any possibly blocking frame handoff
        self.session.recording.append(&packet).await?;

        let mut frames = Vec::new();
        if let Err(e) = self
            .decoder
            .decode(&packet, &mut |frame| frames.push(frame))
        {
            self.stats.decode_failures += 1;
            warn!(
                "Skipping undecodable video packet ({} bytes): {}",
                packet.len(),
                e
            );
        }

        self.relay_frames(frames).await;
        Ok(())
    }

    /// Relay what the decoder still buffers once no more packets can arrive
    async fn flush_decoder(&mut self) {
        let mut frames = Vec::new();
        self.decoder.flush(&mut |frame| frames.push(frame));
        if !frames.is_empty() {
            debug!("Decoder flushed {} buffered frame(s)", frames.len());
        }
        self.relay_frames(frames).await;
    }

    async fn relay_frames(&mut self, frames: Vec<DecodedFrame>) {
        self.stats.frames_decoded += frames.len() as u64;
        for frame in frames {
            if self.relay.relay_until(frame, &self.shutdown).await == RelayOutcome::Cancelled {
                // The loop sees the shutdown on its next iteration
                debug!("Shutdown requested during frame relay");
                break;
            }
        }
    }
}
