//! Adafruit DC & Stepper Motor HAT.
//!
//! Two TB6612 dual H-bridges behind a PCA9685.  Each of the four DC ports
//! uses one PWM channel for speed and two channels as direction pins; a
//! stepper occupies two adjacent DC ports (M1/M2 or M3/M4).
//!
//! The driver implements [`ActuatorDriver`] with the stepper as the
//! position channel and one DC port as the flow channel.  It keeps only
//! the coil phase; where the plate is belongs to the sequencer.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info};

use super::pca9685::Pca9685;
use crate::app::ports::{ActuatorDriver, Channel, Direction, StepMode};
use crate::config::MotorHatConfig;
use crate::error::ActuatorError;

/// PCA9685 channels for one H-bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DcPins {
    pub pwm: u8,
    pub in1: u8,
    pub in2: u8,
}

/// DC port 1–4 to PCA9685 channels.
pub fn dc_pins(port: u8) -> Option<DcPins> {
    match port {
        1 => Some(DcPins { pwm: 8, in2: 9, in1: 10 }),
        2 => Some(DcPins { pwm: 13, in2: 12, in1: 11 }),
        3 => Some(DcPins { pwm: 2, in2: 3, in1: 4 }),
        4 => Some(DcPins { pwm: 7, in2: 6, in1: 5 }),
        _ => None,
    }
}

/// Both bridges of a stepper port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepperPins {
    pub a: DcPins,
    pub b: DcPins,
}

/// Stepper port 1 (M1/M2) or 2 (M3/M4).
pub fn stepper_pins(port: u8) -> Option<StepperPins> {
    let first = match port {
        1 => 1,
        2 => 3,
        _ => return None,
    };
    Some(StepperPins {
        a: dc_pins(first)?,
        b: dc_pins(first + 1)?,
    })
}

/// Microsteps per full step.
pub const MICROSTEPS: i32 = 8;
/// Sine-weighted coil strength for microstepping, 0–255.
const MICROSTEP_CURVE: [u8; 9] = [0, 50, 98, 142, 180, 212, 236, 250, 255];
/// Coil energisation per half-step phase: [AIN2, BIN1, AIN1, BIN2].
const STEP_COILS: [[bool; 4]; 8] = [
    [true, false, false, false],
    [true, true, false, false],
    [false, true, false, false],
    [false, true, true, false],
    [false, false, true, false],
    [false, false, true, true],
    [false, false, false, true],
    [true, false, false, true],
];

const HALF: i32 = MICROSTEPS / 2;
const CYCLE: i32 = MICROSTEPS * 4;

/// Coil PWM strengths and pin states for one step phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoilDrive {
    pub pwm_a: u8,
    pub pwm_b: u8,
    pub coils: [bool; 4],
}

/// Advance `phase` (0..32) by one step of `mode` and return the new phase
/// with the coil drive for it.
pub fn next_phase(phase: i32, direction: Direction, mode: StepMode) -> (i32, CoilDrive) {
    let sign = match direction {
        Direction::Forward => 1,
        Direction::Backward => -1,
    };
    let on_half = (phase / HALF) % 2 == 1;
    let advance = match mode {
        // Single lands on whole steps, double on half steps.
        StepMode::Single if on_half => HALF,
        StepMode::Single => MICROSTEPS,
        StepMode::Double if on_half => MICROSTEPS,
        StepMode::Double => HALF,
        StepMode::Interleave => HALF,
        StepMode::Microstep => 1,
    };
    let phase = (phase + sign * advance).rem_euclid(CYCLE);

    let drive = if mode == StepMode::Microstep {
        let m = MICROSTEPS;
        let curve = |i: i32| MICROSTEP_CURVE[i as usize];
        let (pwm_a, pwm_b, coils) = match phase / m {
            0 => (curve(m - phase), curve(phase), [true, true, false, false]),
            1 => (curve(phase - m), curve(2 * m - phase), [false, true, true, false]),
            2 => (curve(3 * m - phase), curve(phase - 2 * m), [false, false, true, true]),
            _ => (curve(phase - 3 * m), curve(4 * m - phase), [true, false, false, true]),
        };
        CoilDrive { pwm_a, pwm_b, coils }
    } else {
        CoilDrive {
            pwm_a: u8::MAX,
            pwm_b: u8::MAX,
            coils: STEP_COILS[(phase / HALF) as usize],
        }
    };
    (phase, drive)
}

/// 8-bit rate to a 12-bit duty count.
fn duty(rate: u8) -> u16 {
    u16::from(rate) * 16
}

pub struct MotorHat<I2C, D> {
    pwm: Pca9685<I2C>,
    delay: D,
    stepper: StepperPins,
    pump: DcPins,
    phase: i32,
    step_interval_us: u32,
}

impl<I2C: I2c, D: DelayNs> MotorHat<I2C, D> {
    /// Initialise the PWM chip and release every port.
    pub fn new(i2c: I2C, mut delay: D, config: &MotorHatConfig) -> Result<Self, ActuatorError> {
        let stepper = stepper_pins(config.stepper_port).ok_or(ActuatorError::UnsupportedCommand)?;
        let pump = dc_pins(config.pump_port).ok_or(ActuatorError::UnsupportedCommand)?;

        let mut pwm = Pca9685::new(i2c, config.i2c_address);
        pwm.init(config.pwm_frequency_hz, &mut delay)?;

        let per_minute = u32::from(config.steps_per_revolution) * u32::from(config.stepper_rpm);
        let step_interval_us = 60_000_000 / per_minute.max(1);
        info!(
            "Motor HAT @ {:#04x}: stepper port {}, pump port {}, {} us/step",
            config.i2c_address, config.stepper_port, config.pump_port, step_interval_us
        );

        let mut hat = Self {
            pwm,
            delay,
            stepper,
            pump,
            phase: 0,
            step_interval_us,
        };
        hat.release(Channel::Position)?;
        hat.release(Channel::Flow)?;
        Ok(hat)
    }

    /// Current coil phase (0..32).
    pub fn phase(&self) -> i32 {
        self.phase
    }

    fn one_step(&mut self, direction: Direction, mode: StepMode) -> Result<(), ActuatorError> {
        let (phase, drive) = next_phase(self.phase, direction, mode);
        self.phase = phase;
        let StepperPins { a, b } = self.stepper;
        self.pwm.set_pwm(a.pwm, 0, duty(drive.pwm_a))?;
        self.pwm.set_pwm(b.pwm, 0, duty(drive.pwm_b))?;
        let [ain2, bin1, ain1, bin2] = drive.coils;
        self.pwm.set_pin(a.in2, ain2)?;
        self.pwm.set_pin(b.in1, bin1)?;
        self.pwm.set_pin(a.in1, ain1)?;
        self.pwm.set_pin(b.in2, bin2)
    }

    fn run_dc(&mut self, pins: DcPins, direction: Option<Direction>) -> Result<(), ActuatorError> {
        let (in1, in2) = match direction {
            Some(Direction::Forward) => (true, false),
            Some(Direction::Backward) => (false, true),
            None => (false, false),
        };
        // Drop the active pin first so the bridge never sees both high.
        if in1 {
            self.pwm.set_pin(pins.in2, false)?;
            self.pwm.set_pin(pins.in1, true)
        } else {
            self.pwm.set_pin(pins.in1, false)?;
            self.pwm.set_pin(pins.in2, in2)
        }
    }
}

impl<I2C: I2c, D: DelayNs> ActuatorDriver for MotorHat<I2C, D> {
    fn move_by(
        &mut self,
        steps: u32,
        direction: Direction,
        mode: StepMode,
    ) -> Result<(), ActuatorError> {
        let (ticks, interval) = match mode {
            StepMode::Single | StepMode::Double => (steps, self.step_interval_us),
            StepMode::Interleave => (steps, self.step_interval_us / 2),
            StepMode::Microstep => (
                steps.saturating_mul(MICROSTEPS as u32),
                self.step_interval_us / MICROSTEPS as u32,
            ),
        };
        debug!("Motor HAT: {steps} steps {direction:?} {mode:?}");
        for _ in 0..ticks {
            self.one_step(direction, mode)?;
            self.delay.delay_us(interval);
        }
        if mode == StepMode::Microstep {
            // Finish on a full-step phase.
            while self.phase % MICROSTEPS != 0 {
                self.one_step(direction, mode)?;
                self.delay.delay_us(interval);
            }
        }
        Ok(())
    }

    fn set_rate(&mut self, channel: Channel, rate: u8) -> Result<(), ActuatorError> {
        match channel {
            Channel::Position => Err(ActuatorError::UnsupportedCommand),
            Channel::Flow if rate == 0 => self.release(Channel::Flow),
            Channel::Flow => {
                let pump = self.pump;
                self.pwm.set_pwm(pump.pwm, 0, duty(rate))?;
                self.run_dc(pump, Some(Direction::Forward))
            }
        }
    }

    fn release(&mut self, channel: Channel) -> Result<(), ActuatorError> {
        match channel {
            Channel::Position => {
                let StepperPins { a, b } = self.stepper;
                self.run_dc(a, None)?;
                self.run_dc(b, None)
            }
            Channel::Flow => {
                let pump = self.pump;
                self.run_dc(pump, None)?;
                self.pwm.set_pwm(pump.pwm, 0, 0)
            }
        }
    }
}
