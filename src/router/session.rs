use super::keepalive::KeepAlive;
use super::RouterStats;
use crate::config::SkycamConfig;
use crate::driver::DroneDriver;
use crate::error::{DriverError, RecordingError, Result};
use crate::events::{event_channel, EventReceiver};
use crate::recording::{save_metadata, RecordingSink, RecordingState, SessionMetadata};
use crate::relay::RelayStats;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Everything one run of the control loop owns
///
/// The recording is created before the driver is touched, so a session whose
/// storage cannot be created never connects or processes input.
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    driver: Arc<dyn DroneDriver>,
    pub(super) recording: RecordingSink,
    keepalive: Option<KeepAlive>,
    save_metadata: bool,
}

/// What a finished session did
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub recording_path: PathBuf,
    pub recording_state: RecordingState,
    pub packets_recorded: u64,
    pub bytes_recorded: u64,
    pub keepalive_requests: u64,
    pub stats: RouterStats,
    pub relay: RelayStats,
    pub metadata_path: Option<PathBuf>,
}

impl Session {
    /// Start a session now, creating its recording file
    pub async fn open(
        config: &SkycamConfig,
        driver: Arc<dyn DroneDriver>,
    ) -> std::result::Result<Self, RecordingError> {
        let started_at = Utc::now();
        let recording = RecordingSink::create(&config.recording, started_at).await?;
        Ok(Self::new(
            driver,
            recording,
            started_at,
            config.recording.save_metadata,
        ))
    }

    pub fn new(
        driver: Arc<dyn DroneDriver>,
        recording: RecordingSink,
        started_at: DateTime<Utc>,
        save_metadata: bool,
    ) -> Self {
        let id = Uuid::new_v4();
        info!(
            "Session {} started, recording to {}",
            id,
            recording.path().display()
        );
        Self {
            id,
            started_at,
            driver,
            recording,
            keepalive: None,
            save_metadata,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn driver(&self) -> Arc<dyn DroneDriver> {
        Arc::clone(&self.driver)
    }

    pub fn recording(&self) -> &RecordingSink {
        &self.recording
    }

    /// Connect the driver and return the channel its events arrive on
    pub async fn connect(
        &self,
        capacity: usize,
    ) -> std::result::Result<EventReceiver, DriverError> {
        let (sender, receiver) = event_channel(capacity);
        self.driver.connect(sender).await?;
        Ok(receiver)
    }

    pub(super) fn start_keepalive(&mut self, period: Duration, parent: &CancellationToken) {
        if self.keepalive.is_some() {
            return;
        }
        self.keepalive = Some(KeepAlive::spawn(self.driver(), period, parent));
    }

    pub(super) fn keepalive_running(&self) -> bool {
        self.keepalive.is_some()
    }

    /// Stop the keep-alive, release the driver and close the recording
    pub(super) async fn teardown(
        mut self,
        stats: RouterStats,
        relay: RelayStats,
    ) -> Result<SessionReport> {
        info!("Tearing down session {}", self.id);

        let keepalive_requests = match self.keepalive.take() {
            Some(keepalive) => keepalive.stop().await,
            None => 0,
        };

        if let Err(e) = self.driver.disconnect().await {
            warn!("Driver disconnect failed: {}", e);
        }

        let closed = self.recording.close().await;

        let mut metadata_path = None;
        if self.save_metadata {
            let metadata = SessionMetadata {
                session_id: self.id,
                recording_path: self.recording.path().to_path_buf(),
                started_at: self.started_at,
                ended_at: Utc::now(),
                recording_state: self.recording.state(),
                packets_recorded: self.recording.packets_written(),
                bytes_recorded: self.recording.bytes_committed(),
                packets_skipped: self.recording.packets_skipped(),
                frames_relayed: relay.frames_relayed,
                frames_dropped: relay.frames_dropped,
                commands_dispatched: stats.commands_dispatched,
                commands_failed: stats.commands_failed,
                telemetry_reports: stats.telemetry_reports,
                decode_failures: stats.decode_failures,
            };
            match save_metadata(&metadata).await {
                Ok(path) => metadata_path = Some(path),
                Err(e) => warn!("Could not save session metadata: {}", e),
            }
        }

        closed?;

        Ok(SessionReport {
            session_id: self.id,
            recording_path: self.recording.path().to_path_buf(),
            recording_state: self.recording.state(),
            packets_recorded: self.recording.packets_written(),
            bytes_recorded: self.recording.bytes_committed(),
            keepalive_requests,
            stats,
            relay,
            metadata_path,
        })
    }
}
