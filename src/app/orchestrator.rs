use super::consumer::ConsumerStats;
use super::keyboard_input::KeyboardCommandSource;
use super::shutdown::ShutdownHandle;
use super::types::ComponentState;
use crate::command::{command_channel, CommandReceiver, CommandSender};
use crate::config::SkycamConfig;
use crate::driver::{DroneDriver, SimulatedDriver, SimulationMode};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Main application coordinator: one session from start to exit code
pub struct SkycamOrchestrator {
    pub(super) config: SkycamConfig,
    pub(super) driver: Arc<dyn DroneDriver>,

    // Command queue; our own sender is released once the router runs
    pub(super) commands: Option<CommandSender>,
    pub(super) command_rx: Option<CommandReceiver>,

    // Components
    pub(super) keyboard: Option<KeyboardCommandSource>,
    pub(super) keyboard_enabled: bool,
    pub(super) consumer: Option<JoinHandle<ConsumerStats>>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown: ShutdownHandle,
}

impl SkycamOrchestrator {
    /// Create an orchestrator flying the in-process simulated drone
    pub fn new(config: SkycamConfig) -> Self {
        let driver = Arc::new(SimulatedDriver::new(
            config.driver.clone(),
            SimulationMode::Generated,
        ));
        Self::with_driver(config, driver)
    }

    /// Create an orchestrator around an existing driver
    pub fn with_driver(config: SkycamConfig, driver: Arc<dyn DroneDriver>) -> Self {
        let (commands, command_rx) = command_channel(config.system.command_queue_capacity);

        Self {
            config,
            driver,
            commands: Some(commands),
            command_rx: Some(command_rx),
            keyboard: None,
            keyboard_enabled: false,
            consumer: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown: ShutdownHandle::new(),
        }
    }

    /// Enable or disable the keyboard command source
    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        self.keyboard_enabled = enabled;
    }

    /// Another producer for the command queue; `None` once the session runs
    pub fn command_sender(&self) -> Option<CommandSender> {
        self.commands.clone()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &SkycamConfig {
        &self.config
    }
}
