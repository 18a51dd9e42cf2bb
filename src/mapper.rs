//! Linear range mapping.
//!
//! Translates a value from a calibrated input range into an output range.
//! Used three times per cycle: raw tide level → normalized level (0–100),
//! then normalized level → stepper steps and → pump rate.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, MapError};

/// Linear interpolation of `x` from `[in_min, in_max]` onto `[out_min, out_max]`.
///
/// Equivalent to `(x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min`,
/// evaluated as a two-sided lerp so both endpoints map exactly.
/// Values outside the input range extrapolate.
pub fn map(x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> Result<f64, MapError> {
    #[allow(clippy::float_cmp)]
    if in_max == in_min {
        return Err(MapError::DivisionDegenerate);
    }
    let t = (x - in_min) / (in_max - in_min);
    Ok(out_min * (1.0 - t) + out_max * t)
}

/// [`map`] followed by a clamp to `[min(out_min, out_max), max(out_min, out_max)]`.
pub fn map_clamped(
    x: f64,
    in_min: f64,
    in_max: f64,
    out_min: f64,
    out_max: f64,
) -> Result<f64, MapError> {
    let v = map(x, in_min, in_max, out_min, out_max)?;
    let lo = out_min.min(out_max);
    let hi = out_min.max(out_max);
    // `max`/`min` rather than `clamp`: a NaN from overflowing inputs lands on `lo`.
    Ok(v.max(lo).min(hi))
}

/// One calibration tuple `(in_min, in_max, out_min, out_max)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub in_min: f64,
    pub in_max: f64,
    pub out_min: f64,
    pub out_max: f64,
}

impl Calibration {
    pub const fn new(in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> Self {
        Self {
            in_min,
            in_max,
            out_min,
            out_max,
        }
    }

    pub fn map(&self, x: f64) -> Result<f64, MapError> {
        map(x, self.in_min, self.in_max, self.out_min, self.out_max)
    }

    pub fn map_clamped(&self, x: f64) -> Result<f64, MapError> {
        map_clamped(x, self.in_min, self.in_max, self.out_min, self.out_max)
    }

    /// Startup check. `name` identifies the calibration in the error.
    pub fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        let all_finite = [self.in_min, self.in_max, self.out_min, self.out_max]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(ConfigError::ValidationFailed(
                "calibration bounds must be finite",
            ));
        }
        #[allow(clippy::float_cmp)]
        if self.in_min == self.in_max {
            return Err(ConfigError::DegenerateCalibration(name));
        }
        Ok(())
    }
}
