use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkycamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

/// Failures of the raw video recording file
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Failed to create recording directory {}: {source}", path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create recording file {}: {source}", path.display())]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write recording {} after {committed} bytes: {source}", path.display())]
    Write {
        path: PathBuf,
        committed: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to close recording {}: {source}", path.display())]
    Close {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures reported by a drone driver
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("Driver is not connected")]
    NotConnected,

    #[error("Connection failed: {details}")]
    Connect { details: String },

    #[error("Actuator call '{action}' failed: {details}")]
    Actuator { action: String, details: String },

    #[error("Event channel closed")]
    EventChannelClosed,
}

/// Failures reported by a video decoder for a single packet
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Malformed packet: {details}")]
    Malformed { details: String },

    #[error("Access unit exceeds {limit} bytes")]
    Oversized { limit: usize },
}

impl SkycamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SkycamError>;
