//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller (domain)
//! ```
//!
//! Driven adapters (tide feed, motor controller, telemetry socket, config
//! file) implement these traits.  The [`Controller`](super::controller::Controller)
//! consumes them via generics, so the domain core never touches the
//! network or the I²C bus directly.

use serde::{Deserialize, Serialize};

use crate::config::SystemConfig;
use crate::error::{ActuatorError, ConfigError, FetchError, TelemetryError};

use super::model::TideReading;

// ───────────────────────────────────────────────────────────────
// Tide source port (driven adapter: remote feed → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this once per cycle.
pub trait TideSource {
    /// Fetch and validate the latest reading.
    fn fetch(&mut self) -> Result<TideReading, FetchError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → motor controller)
// ───────────────────────────────────────────────────────────────

/// The two actuator roles the controller drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Stepper moving the plate along the rail.
    Position,
    /// Peristaltic pump.
    Flow,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Position, Channel::Flow];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }
}

/// Stepper coil sequencing style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMode {
    /// One coil energised at a time.
    Single,
    /// Two coils energised: full step, highest torque.
    Double,
    /// Alternating single/double half steps.
    Interleave,
    /// Sine-weighted microsteps.
    Microstep,
}

/// Write-side port: the domain calls this to command actuators.
///
/// Implementations are stateless executors; the sequencer owns the
/// notion of where the plate is and which phase the cycle is in.
pub trait ActuatorDriver {
    /// Move the position actuator by `steps` in `direction`. Blocks until done.
    fn move_by(
        &mut self,
        steps: u32,
        direction: Direction,
        mode: StepMode,
    ) -> Result<(), ActuatorError>;

    /// Drive `channel` at `rate` (0–255).
    fn set_rate(&mut self, channel: Channel, rate: u8) -> Result<(), ActuatorError>;

    /// De-energise `channel`. Must be safe to call repeatedly.
    fn release(&mut self, channel: Channel) -> Result<(), ActuatorError>;
}

impl<A: ActuatorDriver + ?Sized> ActuatorDriver for Box<A> {
    fn move_by(
        &mut self,
        steps: u32,
        direction: Direction,
        mode: StepMode,
    ) -> Result<(), ActuatorError> {
        (**self).move_by(steps, direction, mode)
    }

    fn set_rate(&mut self, channel: Channel, rate: u8) -> Result<(), ActuatorError> {
        (**self).set_rate(channel, rate)
    }

    fn release(&mut self, channel: Channel) -> Result<(), ActuatorError> {
        (**self).release(channel)
    }
}

// ───────────────────────────────────────────────────────────────
// Telemetry port (driven adapter: domain → listener)
// ───────────────────────────────────────────────────────────────

/// Outbound telemetry: one tagged float per message.
pub trait TelemetrySink {
    fn send(&mut self, address: &str, value: f32) -> Result<(), TelemetryError>;
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Box<T> {
    fn send(&mut self, address: &str, value: f32) -> Result<(), TelemetryError> {
        (**self).send(address, value)
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations validate on both paths: an invalid file is rejected
/// on load, and an invalid config is never written.
pub trait ConfigPort {
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}
