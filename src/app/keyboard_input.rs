use super::shutdown::ShutdownHandle;
use super::types::ShutdownReason;
use crate::command::{Command, CommandSender};
use crate::error::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Distance in centimetres for one movement key press
pub const MOVE_STEP_CM: i32 = 20;
/// Angle in degrees for one rotation key press
pub const ROTATE_STEP_DEG: i32 = 45;

/// What a key press asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Send(Command),
    Quit,
}

/// Key bindings for manual flight
///
/// `t`/`g` take off and land, `w`/`a`/`s`/`d` or the arrow keys move,
/// `r`/`f` climb and descend, `[`/`]` rotate, `8`/`2`/`4`/`6` flip,
/// `q` or `Esc` quit.
pub fn map_key(code: KeyCode) -> Option<KeyAction> {
    let command = match code {
        KeyCode::Char('q') | KeyCode::Esc => return Some(KeyAction::Quit),
        KeyCode::Char('t') => Command::TakeOff,
        KeyCode::Char('g') => Command::Land,
        KeyCode::Char('w') | KeyCode::Up => Command::Forward(MOVE_STEP_CM),
        KeyCode::Char('s') | KeyCode::Down => Command::Backward(MOVE_STEP_CM),
        KeyCode::Char('a') | KeyCode::Left => Command::Left(MOVE_STEP_CM),
        KeyCode::Char('d') | KeyCode::Right => Command::Right(MOVE_STEP_CM),
        KeyCode::Char('r') => Command::Up(MOVE_STEP_CM),
        KeyCode::Char('f') => Command::Down(MOVE_STEP_CM),
        KeyCode::Char(']') => Command::RotateClockwise(ROTATE_STEP_DEG),
        KeyCode::Char('[') => Command::RotateCounterClockwise(ROTATE_STEP_DEG),
        KeyCode::Char('8') => Command::FlipForward,
        KeyCode::Char('2') => Command::FlipBackward,
        KeyCode::Char('4') => Command::FlipLeft,
        KeyCode::Char('6') => Command::FlipRight,
        _ => return None,
    };
    Some(KeyAction::Send(command))
}

/// Terminal keyboard producer for the command queue
pub struct KeyboardCommandSource {
    commands: CommandSender,
    shutdown: ShutdownHandle,
    cancellation_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl KeyboardCommandSource {
    pub fn new(commands: CommandSender, shutdown: ShutdownHandle) -> Self {
        let cancellation_token = shutdown.token().child_token();
        Self {
            commands,
            shutdown,
            cancellation_token,
            task: None,
        }
    }

    /// Start reading key presses on a blocking thread
    pub fn start(&mut self) -> Result<()> {
        info!("Starting keyboard command source - press q to quit");

        let commands = self.commands.clone();
        let shutdown = self.shutdown.clone();
        let cancellation_token = self.cancellation_token.clone();

        self.task = Some(task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            while !cancellation_token.is_cancelled() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        match map_key(key_event.code) {
                            Some(KeyAction::Send(command)) => {
                                if commands.blocking_send(command).is_err() {
                                    debug!("Command queue closed, keyboard source stopping");
                                    break;
                                }
                            }
                            Some(KeyAction::Quit) => {
                                info!("Quit key pressed - requesting shutdown");
                                shutdown.request(ShutdownReason::UserRequest);
                                break;
                            }
                            None => debug!("Unbound key: {:?}", key_event.code),
                        }
                    }
                    Ok(false) => {}
                    Err(e) => warn!("Error polling for keyboard events: {}", e),
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
            debug!("Keyboard command source exited");
        }));

        Ok(())
    }

    /// Stop reading keys and restore the terminal
    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping keyboard command source");
        self.cancellation_token.cancel();

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Keyboard task failed: {}", e);
            }
        }

        // The task may have exited before restoring the terminal
        let _ = disable_raw_mode();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::command_channel;

    #[test]
    fn test_movement_keys() {
        assert_eq!(
            map_key(KeyCode::Char('w')),
            Some(KeyAction::Send(Command::Forward(MOVE_STEP_CM)))
        );
        assert_eq!(map_key(KeyCode::Up), map_key(KeyCode::Char('w')));
        assert_eq!(
            map_key(KeyCode::Char('f')),
            Some(KeyAction::Send(Command::Down(MOVE_STEP_CM)))
        );
    }

    #[test]
    fn test_rotation_keys_are_distinct() {
        assert_eq!(
            map_key(KeyCode::Char(']')),
            Some(KeyAction::Send(Command::RotateClockwise(ROTATE_STEP_DEG)))
        );
        assert_eq!(
            map_key(KeyCode::Char('[')),
            Some(KeyAction::Send(Command::RotateCounterClockwise(ROTATE_STEP_DEG)))
        );
    }

    #[test]
    fn test_quit_and_unbound_keys() {
        assert_eq!(map_key(KeyCode::Char('q')), Some(KeyAction::Quit));
        assert_eq!(map_key(KeyCode::Esc), Some(KeyAction::Quit));
        assert_eq!(map_key(KeyCode::Char('x')), None);
    }

    #[tokio::test]
    async fn test_stop_cancels_without_start() {
        let (commands, _rx) = command_channel(4);
        let shutdown = ShutdownHandle::new();
        let mut source = KeyboardCommandSource::new(commands, shutdown.clone());

        source.stop().await.unwrap();
        assert!(source.cancellation_token.is_cancelled());
        // Stopping the source is not a shutdown request
        assert!(!shutdown.is_requested());
    }
}
