//! Per-cycle data: the reading, its normalized level, and the actuation plan.
//!
//! Nothing here outlives a cycle.

use core::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{ErrorKind, MapError};
use crate::mapper::Calibration;

/// Upper bound of the normalized level scale.
pub const LEVEL_MAX: f64 = 100.0;

/// One scalar tide reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TideReading {
    /// Water level as published by the gauge (metres, gauge datum).
    pub raw_value: f64,
    /// Reading time reported by the source, or fetch time if it reports none.
    pub timestamp: DateTime<Utc>,
}

/// Tide level on a 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedLevel {
    value: f64,
}

impl NormalizedLevel {
    /// Map a reading through the level calibration.
    ///
    /// The calibration's output range is clamped first, then the result is
    /// clamped again to `[0, 100]` so a mis-specified output range cannot
    /// leak out. The level is rounded to a whole percentage.
    pub fn from_reading(reading: &TideReading, level: &Calibration) -> Result<Self, MapError> {
        let v = level.map_clamped(reading.raw_value)?;
        Ok(Self::new(v))
    }

    /// Clamp and round an arbitrary value onto the scale.
    pub fn new(value: f64) -> Self {
        Self {
            value: value.max(0.0).min(LEVEL_MAX).round(),
        }
    }

    pub fn value(self) -> f64 {
        self.value
    }
}

/// What one cycle will do with the actuators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuationPlan {
    /// Steps away from home for the plate.
    pub position_steps: u32,
    /// Pump rate (0–255) during the hold.
    pub flow_rate: u8,
    /// How long the pump runs at `flow_rate`.
    pub hold_duration: Duration,
}

impl ActuationPlan {
    /// Derive the plan from a normalized level through the position and
    /// flow calibrations. Both are clamped to their output range.
    pub fn derive(
        level: NormalizedLevel,
        position: &Calibration,
        flow: &Calibration,
        hold_duration: Duration,
    ) -> Result<Self, MapError> {
        let steps = position.map_clamped(level.value())?.round();
        let rate = flow.map_clamped(level.value())?.round();
        Ok(Self {
            position_steps: steps.max(0.0).min(f64::from(u32::MAX)) as u32,
            flow_rate: rate.max(0.0).min(255.0) as u8,
            hold_duration,
        })
    }
}

/// Outcome of one cycle, consumed by the scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleResult {
    pub success: bool,
    pub error: Option<ErrorKind>,
}

impl CycleResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(kind: ErrorKind) -> Self {
        Self {
            success: false,
            error: Some(kind),
        }
    }
}
