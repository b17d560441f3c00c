pub mod consumer;
pub mod keyboard_input;

mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;

#[cfg(test)]
mod tests;

pub use consumer::{ConsumerStats, FrameConsumer};
pub use keyboard_input::KeyboardCommandSource;
pub use orchestrator::SkycamOrchestrator;
pub use shutdown::ShutdownHandle;
pub use types::{
    exit_code_for, ComponentState, ShutdownReason, EXIT_FAILURE, EXIT_OK, EXIT_RECORDING_CREATE,
    EXIT_RECORDING_WRITE,
};
