use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SkycamConfig {
    pub driver: DriverConfig,
    pub video: VideoConfig,
    pub recording: RecordingConfig,
    pub relay: RelayConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DriverConfig {
    /// Local UDP port the drone driver binds for its control link
    #[serde(default = "default_driver_port")]
    pub port: u16,

    /// Interval between synthetic video packets from the simulated driver
    #[serde(default = "default_packet_interval_ms")]
    pub packet_interval_ms: u64,

    /// Interval between synthetic telemetry snapshots from the simulated driver
    #[serde(default = "default_telemetry_interval_ms")]
    pub telemetry_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct VideoConfig {
    /// Encoder rate requested once the link is up
    #[serde(default = "default_encoder_rate")]
    pub encoder_rate: u8,

    /// How often the video start request is re-issued to keep the stream alive
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RecordingConfig {
    /// Directory holding one raw NAL recording per session
    #[serde(default = "default_recording_path")]
    pub path: String,

    /// Time zone used for the session timestamp in recording file names
    #[serde(default = "default_recording_timezone")]
    pub timezone: String,

    /// What to do when an append to the recording fails mid-session
    #[serde(default)]
    pub on_write_failure: WriteFailurePolicy,

    /// Write a JSON summary next to the recording on teardown
    #[serde(default = "default_save_metadata")]
    pub save_metadata: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RelayConfig {
    /// Frames buffered between the router and the frame consumer
    #[serde(default = "default_relay_capacity")]
    pub capacity: usize,

    /// Behavior when the consumer falls behind
    #[serde(default)]
    pub policy: RelayPolicy,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Inbound command queue capacity
    #[serde(default = "default_command_queue_capacity")]
    pub command_queue_capacity: usize,

    /// Driver event queue capacity
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

/// Reaction to a failed append or sync of the recording file
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WriteFailurePolicy {
    /// Stop recording, keep flying
    #[default]
    Degrade,
    /// End the session
    Abort,
}

/// Overflow behavior of the frame relay
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RelayPolicy {
    /// Wait for the consumer; never drops frames
    #[default]
    Block,
    /// Drop the frame being relayed when the buffer is full
    DropNewest,
}

impl SkycamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("skycam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("driver.port", default_driver_port() as i64)?
            .set_default("driver.packet_interval_ms", default_packet_interval_ms())?
            .set_default(
                "driver.telemetry_interval_ms",
                default_telemetry_interval_ms(),
            )?
            .set_default("video.encoder_rate", default_encoder_rate() as i64)?
            .set_default(
                "video.keepalive_interval_ms",
                default_keepalive_interval_ms(),
            )?
            .set_default("recording.path", default_recording_path())?
            .set_default("recording.timezone", default_recording_timezone())?
            .set_default("recording.on_write_failure", "degrade")?
            .set_default("recording.save_metadata", default_save_metadata())?
            .set_default("relay.capacity", default_relay_capacity() as i64)?
            .set_default("relay.policy", "block")?
            .set_default(
                "system.command_queue_capacity",
                default_command_queue_capacity() as i64,
            )?
            .set_default(
                "system.event_queue_capacity",
                default_event_queue_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // SKYCAM_RELAY__CAPACITY=32 overrides relay.capacity
            .add_source(
                Environment::with_prefix("SKYCAM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: SkycamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.video.keepalive_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Video keepalive_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.driver.packet_interval_ms == 0 || self.driver.telemetry_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Driver intervals must be greater than 0".to_string(),
            ));
        }

        if self.recording.path.trim().is_empty() {
            return Err(ConfigError::Message(
                "Recording path must not be empty".to_string(),
            ));
        }

        if self.recording.timezone.parse::<Tz>().is_err() {
            return Err(ConfigError::Message(format!(
                "Unknown recording timezone '{}'",
                self.recording.timezone
            )));
        }

        if self.relay.capacity == 0 {
            return Err(ConfigError::Message(
                "Relay capacity must be greater than 0".to_string(),
            ));
        }

        if self.system.command_queue_capacity == 0 || self.system.event_queue_capacity == 0 {
            return Err(ConfigError::Message(
                "Queue capacities must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl VideoConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }
}

impl DriverConfig {
    pub fn packet_interval(&self) -> Duration {
        Duration::from_millis(self.packet_interval_ms)
    }

    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms)
    }
}

impl Default for SkycamConfig {
    fn default() -> Self {
        Self {
            driver: DriverConfig {
                port: default_driver_port(),
                packet_interval_ms: default_packet_interval_ms(),
                telemetry_interval_ms: default_telemetry_interval_ms(),
            },
            video: VideoConfig {
                encoder_rate: default_encoder_rate(),
                keepalive_interval_ms: default_keepalive_interval_ms(),
            },
            recording: RecordingConfig {
                path: default_recording_path(),
                timezone: default_recording_timezone(),
                on_write_failure: WriteFailurePolicy::default(),
                save_metadata: default_save_metadata(),
            },
            relay: RelayConfig {
                capacity: default_relay_capacity(),
                policy: RelayPolicy::default(),
            },
            system: SystemConfig {
                command_queue_capacity: default_command_queue_capacity(),
                event_queue_capacity: default_event_queue_capacity(),
            },
        }
    }
}

// Default value functions
fn default_driver_port() -> u16 {
    8890
}
fn default_packet_interval_ms() -> u64 {
    33
}
fn default_telemetry_interval_ms() -> u64 {
    1000
}

fn default_encoder_rate() -> u8 {
    5
}
fn default_keepalive_interval_ms() -> u64 {
    100
}

fn default_recording_path() -> String {
    "recordings".to_string()
}
fn default_recording_timezone() -> String {
    "UTC".to_string()
}
fn default_save_metadata() -> bool {
    true
}

fn default_relay_capacity() -> usize {
    16
}

fn default_command_queue_capacity() -> usize {
    64
}
fn default_event_queue_capacity() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SkycamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.video.keepalive_interval(), Duration::from_millis(100));
        assert_eq!(config.relay.policy, RelayPolicy::Block);
        assert_eq!(
            config.recording.on_write_failure,
            WriteFailurePolicy::Degrade
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = SkycamConfig::default();
        config.relay.capacity = 0;
        assert!(config.validate().is_err());

        config.relay.capacity = 4;
        config.recording.timezone = "Mars/Olympus_Mons".to_string();
        assert!(config.validate().is_err());

        config.recording.timezone = "Europe/Berlin".to_string();
        assert!(config.validate().is_ok());

        config.video.keepalive_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[relay]\ncapacity = 2\npolicy = \"drop_newest\"\n\n[recording]\non_write_failure = \"abort\"\npath = \"/tmp/flights\""
        )
        .unwrap();

        let config = SkycamConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.relay.capacity, 2);
        assert_eq!(config.relay.policy, RelayPolicy::DropNewest);
        assert_eq!(config.recording.on_write_failure, WriteFailurePolicy::Abort);
        assert_eq!(config.recording.path, "/tmp/flights");
        // Untouched sections keep their defaults
        assert_eq!(config.video.encoder_rate, 5);
        assert_eq!(config.driver.port, 8890);
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let rendered = toml::to_string_pretty(&SkycamConfig::default()).unwrap();
        assert!(rendered.contains("on_write_failure = \"degrade\""));
        let parsed: SkycamConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, SkycamConfig::default());
    }
}
