use crate::command::Command;
use crate::driver::DroneDriver;
use crate::error::DriverError;
use std::sync::Arc;
use tracing::{info, warn};

/// Counters kept by the command dispatcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub dispatched: u64,
    pub failed: u64,
}

/// Maps each command to exactly one actuator call
///
/// Parameters are forwarded unchanged; the driver owns range checks. Failed
/// calls are logged and counted, never retried.
pub struct CommandDispatcher {
    driver: Arc<dyn DroneDriver>,
    stats: DispatchStats,
}

impl CommandDispatcher {
    pub fn new(driver: Arc<dyn DroneDriver>) -> Self {
        Self {
            driver,
            stats: DispatchStats::default(),
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Log the command, then invoke the matching actuator call
    pub async fn dispatch(&mut self, command: Command) -> Result<(), DriverError> {
        info!(
            command = command.name(),
            value = ?command.value(),
            "{}",
            command.description()
        );

        let driver = &self.driver;
        let result = match command {
            Command::TakeOff => driver.take_off().await,
            Command::Land => driver.land().await,
            Command::RotateClockwise(angle) => driver.clockwise(angle).await,
            Command::RotateCounterClockwise(angle) => driver.counter_clockwise(angle).await,
            Command::Up(distance) => driver.up(distance).await,
            Command::Down(distance) => driver.down(distance).await,
            Command::Left(distance) => driver.left(distance).await,
            Command::Right(distance) => driver.right(distance).await,
            Command::Forward(distance) => driver.forward(distance).await,
            Command::Backward(distance) => driver.backward(distance).await,
            Command::FlipForward => driver.front_flip().await,
            Command::FlipBackward => driver.back_flip().await,
            Command::FlipLeft => driver.left_flip().await,
            Command::FlipRight => driver.right_flip().await,
        };

        self.stats.dispatched += 1;
        if let Err(e) = &result {
            self.stats.failed += 1;
            warn!("Command '{}' failed: {}", command.name(), e);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ActuatorCall, SimulatedDriver};
    use crate::events::event_channel;

    async fn connected_driver() -> Arc<SimulatedDriver> {
        let driver = Arc::new(SimulatedDriver::manual());
        let (tx, _rx) = event_channel(4);
        driver.connect(tx).await.unwrap();
        driver
    }

    #[tokio::test]
    async fn test_every_variant_maps_to_its_own_call() {
        let driver = connected_driver().await;
        let mut dispatcher = CommandDispatcher::new(driver.clone());

        let commands = [
            Command::TakeOff,
            Command::Land,
            Command::RotateClockwise(90),
            Command::RotateCounterClockwise(90),
            Command::Up(20),
            Command::Down(21),
            Command::Left(22),
            Command::Right(23),
            Command::Forward(24),
            Command::Backward(25),
            Command::FlipForward,
            Command::FlipBackward,
            Command::FlipLeft,
            Command::FlipRight,
        ];
        for command in commands {
            dispatcher.dispatch(command).await.unwrap();
        }

        assert_eq!(
            driver.actuator_calls(),
            vec![
                ActuatorCall::TakeOff,
                ActuatorCall::Land,
                ActuatorCall::Clockwise(90),
                ActuatorCall::CounterClockwise(90),
                ActuatorCall::Up(20),
                ActuatorCall::Down(21),
                ActuatorCall::Left(22),
                ActuatorCall::Right(23),
                ActuatorCall::Forward(24),
                ActuatorCall::Backward(25),
                ActuatorCall::FrontFlip,
                ActuatorCall::BackFlip,
                ActuatorCall::LeftFlip,
                ActuatorCall::RightFlip,
            ]
        );
        assert_eq!(dispatcher.stats().dispatched, 14);
    }

    #[tokio::test]
    async fn test_parameters_are_not_clamped() {
        let driver = connected_driver().await;
        let mut dispatcher = CommandDispatcher::new(driver.clone());

        dispatcher.dispatch(Command::Up(-5000)).await.unwrap();
        dispatcher.dispatch(Command::RotateClockwise(720)).await.unwrap();

        assert_eq!(
            driver.actuator_calls(),
            vec![ActuatorCall::Up(-5000), ActuatorCall::Clockwise(720)]
        );
    }

    #[tokio::test]
    async fn test_failed_call_is_counted_not_retried() {
        let driver = connected_driver().await;
        driver.fail_action("take_off");
        let mut dispatcher = CommandDispatcher::new(driver.clone());

        assert!(dispatcher.dispatch(Command::TakeOff).await.is_err());
        assert!(dispatcher.dispatch(Command::Land).await.is_ok());

        assert_eq!(
            driver.actuator_calls(),
            vec![ActuatorCall::TakeOff, ActuatorCall::Land]
        );
        assert_eq!(
            dispatcher.stats(),
            DispatchStats {
                dispatched: 2,
                failed: 1
            }
        );
    }
}
