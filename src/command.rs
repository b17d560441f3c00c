use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Movement commands accepted by the control loop
///
/// Angles are degrees and distances are centimetres; both pass through to the
/// driver untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    TakeOff,
    Land,
    RotateClockwise(i32),
    RotateCounterClockwise(i32),
    Up(i32),
    Down(i32),
    Left(i32),
    Right(i32),
    Forward(i32),
    Backward(i32),
    FlipForward,
    FlipBackward,
    FlipLeft,
    FlipRight,
}

impl Command {
    /// Get the command name as a string for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::TakeOff => "take_off",
            Command::Land => "land",
            Command::RotateClockwise(_) => "rotate_clockwise",
            Command::RotateCounterClockwise(_) => "rotate_counter_clockwise",
            Command::Up(_) => "up",
            Command::Down(_) => "down",
            Command::Left(_) => "left",
            Command::Right(_) => "right",
            Command::Forward(_) => "forward",
            Command::Backward(_) => "backward",
            Command::FlipForward => "flip_forward",
            Command::FlipBackward => "flip_backward",
            Command::FlipLeft => "flip_left",
            Command::FlipRight => "flip_right",
        }
    }

    /// Numeric parameter carried by rotate and translate commands
    pub fn value(&self) -> Option<i32> {
        match *self {
            Command::RotateClockwise(v)
            | Command::RotateCounterClockwise(v)
            | Command::Up(v)
            | Command::Down(v)
            | Command::Left(v)
            | Command::Right(v)
            | Command::Forward(v)
            | Command::Backward(v) => Some(v),
            _ => None,
        }
    }

    /// Get a human-readable description of the command
    pub fn description(&self) -> String {
        match self {
            Command::TakeOff => "Going to take off".to_string(),
            Command::Land => "Going to land".to_string(),
            Command::RotateClockwise(v) => format!("Rotating clockwise {}", v),
            Command::RotateCounterClockwise(v) => format!("Rotating counter-clockwise {}", v),
            Command::Up(v) => format!("Going up {}", v),
            Command::Down(v) => format!("Going down {}", v),
            Command::Left(v) => format!("Going left {}", v),
            Command::Right(v) => format!("Going right {}", v),
            Command::Forward(v) => format!("Going forward {}", v),
            Command::Backward(v) => format!("Going backward {}", v),
            Command::FlipForward => "Front flip".to_string(),
            Command::FlipBackward => "Back flip".to_string(),
            Command::FlipLeft => "Left flip".to_string(),
            Command::FlipRight => "Right flip".to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

pub type CommandSender = mpsc::Sender<Command>;
pub type CommandReceiver = mpsc::Receiver<Command>;

/// Create the bounded inbound command queue
pub fn command_channel(capacity: usize) -> (CommandSender, CommandReceiver) {
    mpsc::channel(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_properties() {
        assert_eq!(Command::RotateClockwise(90).name(), "rotate_clockwise");
        assert_eq!(
            Command::RotateCounterClockwise(90).name(),
            "rotate_counter_clockwise"
        );
        assert_eq!(Command::Backward(-20).value(), Some(-20));
        assert_eq!(Command::FlipLeft.value(), None);
        assert_eq!(Command::Up(30).to_string(), "Going up 30");
    }

    #[tokio::test]
    async fn test_command_channel_preserves_order() {
        let (tx, mut rx) = command_channel(4);
        tx.send(Command::TakeOff).await.unwrap();
        tx.send(Command::Forward(50)).await.unwrap();
        tx.send(Command::Land).await.unwrap();
        drop(tx);

        let mut received = Vec::new();
        while let Some(cmd) = rx.recv().await {
            received.push(cmd);
        }
        assert_eq!(
            received,
            vec![Command::TakeOff, Command::Forward(50), Command::Land]
        );
    }
}
