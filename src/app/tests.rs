use super::*;
use crate::command::Command;
use crate::config::SkycamConfig;
use crate::driver::{ActuatorCall, DroneDriver, SimulatedDriver, SimulationMode};
use crate::error::{DriverError, RecordingError, SkycamError};
use crate::recording::list_recordings;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn create_test_config(dir: &Path) -> SkycamConfig {
    let mut config = SkycamConfig::default();
    config.recording.path = dir.join("recordings").to_string_lossy().into_owned();
    config.driver.packet_interval_ms = 5;
    config.driver.telemetry_interval_ms = 20;
    config.video.keepalive_interval_ms = 10;
    config
}

fn request_shutdown_after(handle: ShutdownHandle, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        handle.request(ShutdownReason::UserRequest);
    });
}

#[test]
fn test_exit_codes() {
    let path = PathBuf::from("/tmp/x");
    let io = || std::io::Error::new(std::io::ErrorKind::Other, "boom");

    let create = SkycamError::Recording(RecordingError::CreateFile {
        path: path.clone(),
        source: io(),
    });
    let write = SkycamError::Recording(RecordingError::Write {
        path,
        committed: 7,
        source: io(),
    });
    let connect = SkycamError::Driver(DriverError::Connect {
        details: "no route".to_string(),
    });

    assert_eq!(exit_code_for(&create), EXIT_RECORDING_CREATE);
    assert_eq!(exit_code_for(&write), EXIT_RECORDING_WRITE);
    assert_eq!(exit_code_for(&connect), EXIT_FAILURE);
}

#[test]
fn test_first_shutdown_reason_wins() {
    let handle = ShutdownHandle::new();
    assert!(!handle.is_requested());

    handle.request(ShutdownReason::Signal("SIGINT".to_string()));
    handle.request(ShutdownReason::InputsClosed);

    assert!(handle.is_requested());
    assert_eq!(
        handle.reason(),
        Some(ShutdownReason::Signal("SIGINT".to_string()))
    );
}

#[tokio::test]
async fn test_session_runs_until_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let driver = Arc::new(SimulatedDriver::new(
        config.driver.clone(),
        SimulationMode::Generated,
    ));
    let mut orchestrator = SkycamOrchestrator::with_driver(config, driver.clone());

    let commands = orchestrator.command_sender().unwrap();
    commands.send(Command::TakeOff).await.unwrap();
    drop(commands);
    request_shutdown_after(orchestrator.shutdown_handle(), Duration::from_millis(300));

    let exit_code = timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .expect("session did not stop")
        .unwrap();

    assert_eq!(exit_code, EXIT_OK);
    assert_eq!(driver.actuator_calls(), vec![ActuatorCall::TakeOff]);
    assert!(driver.calls().contains(&ActuatorCall::StartVideo));
    assert!(!driver.is_connected());
    assert!(orchestrator.command_sender().is_none());

    let recordings = list_recordings(&dir.path().join("recordings")).await.unwrap();
    assert_eq!(recordings.len(), 1);
    assert!(std::fs::metadata(&recordings[0]).unwrap().len() > 0);
    assert!(recordings[0].with_extension("json").exists());

    assert_eq!(
        orchestrator.get_component_state("consumer").await,
        Some(ComponentState::Stopped)
    );
    assert_eq!(
        orchestrator.shutdown_handle().reason(),
        Some(ShutdownReason::UserRequest)
    );
}

#[tokio::test]
async fn test_unwritable_recording_directory_exits_before_connect() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, b"occupied").unwrap();
    let config = create_test_config(&blocker);

    let driver = Arc::new(SimulatedDriver::manual());
    let mut orchestrator = SkycamOrchestrator::with_driver(config, driver.clone());
    orchestrator
        .command_sender()
        .unwrap()
        .send(Command::TakeOff)
        .await
        .unwrap();

    let exit_code = orchestrator.run().await.unwrap();

    assert_eq!(exit_code, EXIT_RECORDING_CREATE);
    assert!(driver.calls().is_empty());
    assert!(!driver.is_connected());
    assert_eq!(
        orchestrator.get_component_state("recording").await,
        Some(ComponentState::Failed)
    );
    assert_eq!(orchestrator.get_component_state("driver").await, None);
}

#[tokio::test]
async fn test_driver_connect_failure_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());

    // Already linked, so the session's connect is refused
    let driver = Arc::new(SimulatedDriver::manual());
    let (link, _) = crate::events::event_channel(1);
    driver.connect(link).await.unwrap();

    let mut orchestrator = SkycamOrchestrator::with_driver(config, driver);
    let exit_code = orchestrator.run().await.unwrap();

    assert_eq!(exit_code, EXIT_FAILURE);
    assert_eq!(
        orchestrator.get_component_state("driver").await,
        Some(ComponentState::Failed)
    );
}

#[tokio::test]
async fn test_session_cannot_run_twice() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let mut orchestrator =
        SkycamOrchestrator::with_driver(config, Arc::new(SimulatedDriver::manual()));

    request_shutdown_after(orchestrator.shutdown_handle(), Duration::from_millis(50));
    assert_eq!(orchestrator.run().await.unwrap(), EXIT_OK);

    assert_eq!(orchestrator.run().await.unwrap(), EXIT_FAILURE);
}
