use crate::error::{RecordingError, SkycamError};

/// Clean shutdown
pub const EXIT_OK: i32 = 0;
/// Configuration, driver connect, or any other failure
pub const EXIT_FAILURE: i32 = 1;
/// The session recording could not be created
pub const EXIT_RECORDING_CREATE: i32 = 2;
/// The session recording could not be written
pub const EXIT_RECORDING_WRITE: i32 = 3;

/// Component lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// Why the session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    UserRequest,
    InputsClosed,
}

/// Process exit code for an error that ended the session
pub fn exit_code_for(error: &SkycamError) -> i32 {
    match error {
        SkycamError::Recording(RecordingError::CreateDirectory { .. })
        | SkycamError::Recording(RecordingError::CreateFile { .. }) => EXIT_RECORDING_CREATE,
        SkycamError::Recording(RecordingError::Write { .. })
        | SkycamError::Recording(RecordingError::Close { .. }) => EXIT_RECORDING_WRITE,
        _ => EXIT_FAILURE,
    }
}
