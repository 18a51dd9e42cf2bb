//! Simulated actuators for running without a Motor HAT.
//!
//! Tracks where the plate would be and what the pump would be doing, and
//! logs every command.  Motion is instantaneous.

use log::{debug, info};

use crate::app::ports::{ActuatorDriver, Channel, Direction, StepMode};
use crate::error::ActuatorError;

/// In-memory stand-in for the stepper and pump.
#[derive(Debug, Default)]
pub struct SimulatedActuators {
    position: i64,
    flow_rate: u8,
    position_energized: bool,
    commands: u64,
}

impl SimulatedActuators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Net steps moved; forward is positive.
    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn flow_rate(&self) -> u8 {
        self.flow_rate
    }

    pub fn is_position_energized(&self) -> bool {
        self.position_energized
    }

    /// Commands received so far.
    pub fn commands(&self) -> u64 {
        self.commands
    }
}

impl ActuatorDriver for SimulatedActuators {
    fn move_by(
        &mut self,
        steps: u32,
        direction: Direction,
        mode: StepMode,
    ) -> Result<(), ActuatorError> {
        self.commands += 1;
        self.position_energized = true;
        let delta = i64::from(steps);
        self.position += match direction {
            Direction::Forward => delta,
            Direction::Backward => -delta,
        };
        debug!(
            "SIM | move {steps} {direction:?} ({mode:?}) -> position {}",
            self.position
        );
        Ok(())
    }

    fn set_rate(&mut self, channel: Channel, rate: u8) -> Result<(), ActuatorError> {
        self.commands += 1;
        match channel {
            Channel::Flow => {
                self.flow_rate = rate;
                info!("SIM | pump rate {rate}");
                Ok(())
            }
            Channel::Position => Err(ActuatorError::UnsupportedCommand),
        }
    }

    fn release(&mut self, channel: Channel) -> Result<(), ActuatorError> {
        self.commands += 1;
        match channel {
            Channel::Position => self.position_energized = false,
            Channel::Flow => self.flow_rate = 0,
        }
        debug!("SIM | release {channel:?}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_position_and_pump() {
        let mut sim = SimulatedActuators::new();
        sim.move_by(300, Direction::Backward, StepMode::Double).unwrap();
        assert_eq!(sim.position(), -300);
        assert!(sim.is_position_energized());

        sim.set_rate(Channel::Flow, 199).unwrap();
        assert_eq!(sim.flow_rate(), 199);

        sim.release(Channel::Position).unwrap();
        sim.release(Channel::Flow).unwrap();
        sim.release(Channel::Flow).unwrap();
        assert!(!sim.is_position_energized());
        assert_eq!(sim.flow_rate(), 0);
        assert_eq!(sim.commands(), 5);
    }

    #[test]
    fn stepper_has_no_rate() {
        let mut sim = SimulatedActuators::new();
        assert_eq!(
            sim.set_rate(Channel::Position, 10),
            Err(ActuatorError::UnsupportedCommand)
        );
    }
}
