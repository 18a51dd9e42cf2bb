//! System configuration parameters
//!
//! All tunable parameters for the tide controller. Defaults reproduce the
//! original gallery deployment (Environment Agency station 0003, one
//! stepper on Motor HAT port 1, pump on port 3); every value can be
//! overridden from a JSON file.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::ports::{Direction, StepMode};
use crate::error::ConfigError;
use crate::mapper::Calibration;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Tide source ---
    /// Measures endpoint returning `items[].latestReading.value`.
    pub tide_url: String,
    /// Whole-request timeout for one fetch (seconds).
    pub fetch_timeout_secs: u64,
    /// Reject readings older than this (seconds). `None` disables the check.
    pub max_reading_age_secs: Option<u64>,

    // --- Mapping ---
    /// Raw gauge level → 0–100.
    pub level_calibration: Calibration,
    /// 0–100 → stepper steps away from home.
    pub position_calibration: Calibration,
    /// 0–100 → pump rate (0–255).
    pub flow_calibration: Calibration,

    // --- Sequencing ---
    /// Pump run time at the mapped rate (seconds).
    pub hold_duration_secs: f64,
    pub away_direction: Direction,
    pub step_mode: StepMode,
    /// Steps per motion command; bounds interrupt latency during travel.
    pub move_chunk_steps: u32,
    pub ramp_floor: u8,
    pub ramp_steps: u16,
    pub ramp_step_delay_ms: u64,

    // --- Scheduling ---
    pub interval_secs: u64,
    pub run_immediately: bool,
    /// Halt after this many consecutive actuator failures. 0 halts on the first.
    pub max_consecutive_actuator_failures: u32,
    /// How long shutdown waits for an in-flight cycle (seconds).
    pub shutdown_grace_secs: u64,

    // --- Telemetry ---
    /// `None` disables OSC telemetry (readings are still logged).
    pub telemetry: Option<TelemetryConfig>,

    // --- Hardware ---
    pub motor_hat: MotorHatConfig,

    // --- Maintenance ---
    pub prime_rate: u8,
    pub flow_test_rate: u8,
    pub flow_test_run_secs: u64,
    pub flow_test_pause_secs: u64,
    pub travel_test_steps: u32,
    pub travel_test_pause_secs: f64,
}

/// OSC-over-UDP listener (e.g. SuperCollider).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub host: String,
    pub port: u16,
    /// Address for the raw level.
    pub address: String,
    /// Address for the normalized level; `None` sends the raw level only.
    pub mapped_address: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            host: "192.168.0.102".into(),
            port: 57120, // SuperCollider default
            address: "/pySend".into(),
            mapped_address: None,
        }
    }
}

/// Adafruit Motor HAT wiring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorHatConfig {
    pub i2c_bus: String,
    pub i2c_address: u8,
    pub pwm_frequency_hz: u16,
    /// Stepper port: 1 = M1/M2, 2 = M3/M4.
    pub stepper_port: u8,
    pub steps_per_revolution: u16,
    pub stepper_rpm: u16,
    /// DC motor port driving the pump (1–4).
    pub pump_port: u8,
}

impl Default for MotorHatConfig {
    fn default() -> Self {
        Self {
            i2c_bus: "/dev/i2c-1".into(),
            i2c_address: 0x60,
            pwm_frequency_hz: 1600,
            stepper_port: 1,
            steps_per_revolution: 200,
            stepper_rpm: 300,
            pump_port: 3,
        }
    }
}

impl MotorHatConfig {
    /// DC ports occupied by the stepper.
    pub fn stepper_dc_ports(&self) -> [u8; 2] {
        if self.stepper_port == 1 { [1, 2] } else { [3, 4] }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Tide source
            tide_url: "https://environment.data.gov.uk/flood-monitoring/id/stations/0003/measures"
                .into(),
            fetch_timeout_secs: 20,
            max_reading_age_secs: None,

            // Mapping
            level_calibration: Calibration::new(-2.96, 4.21, 0.0, 100.0),
            position_calibration: Calibration::new(0.0, 100.0, 50.0, 4715.0),
            flow_calibration: Calibration::new(0.0, 100.0, 100.0, 255.0),

            // Sequencing
            hold_duration_secs: 10.0,
            away_direction: Direction::Backward,
            step_mode: StepMode::Double,
            move_chunk_steps: 100,
            ramp_floor: 0,
            ramp_steps: 10,
            ramp_step_delay_ms: 50,

            // Scheduling
            interval_secs: 180, // feed updates every 15 min
            run_immediately: true,
            max_consecutive_actuator_failures: 3,
            shutdown_grace_secs: 30,

            // Telemetry
            telemetry: Some(TelemetryConfig::default()),

            // Hardware
            motor_hat: MotorHatConfig::default(),

            // Maintenance
            prime_rate: 255,
            flow_test_rate: 10,
            flow_test_run_secs: 10,
            flow_test_pause_secs: 10,
            travel_test_steps: 4715,
            travel_test_pause_secs: 1.0,
        }
    }
}

impl SystemConfig {
    /// Reject configurations that cannot run safely.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.level_calibration.validate("level")?;
        self.position_calibration.validate("position")?;
        self.flow_calibration.validate("flow")?;

        if self.tide_url.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("tide_url is empty"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed("fetch_timeout_secs must be > 0"));
        }
        if self.interval_secs == 0 {
            return Err(ConfigError::ValidationFailed("interval_secs must be > 0"));
        }
        if !self.hold_duration_secs.is_finite() || self.hold_duration_secs < 0.0 {
            return Err(ConfigError::ValidationFailed(
                "hold_duration_secs must be finite and >= 0",
            ));
        }
        if !self.travel_test_pause_secs.is_finite() || self.travel_test_pause_secs < 0.0 {
            return Err(ConfigError::ValidationFailed(
                "travel_test_pause_secs must be finite and >= 0",
            ));
        }
        if self.move_chunk_steps == 0 {
            return Err(ConfigError::ValidationFailed("move_chunk_steps must be > 0"));
        }

        if let Some(t) = &self.telemetry {
            if !t.address.starts_with('/') {
                return Err(ConfigError::ValidationFailed(
                    "telemetry address must start with '/'",
                ));
            }
            if t.mapped_address.as_deref().is_some_and(|a| !a.starts_with('/')) {
                return Err(ConfigError::ValidationFailed(
                    "telemetry mapped_address must start with '/'",
                ));
            }
        }

        let hat = &self.motor_hat;
        if !matches!(hat.stepper_port, 1 | 2) {
            return Err(ConfigError::ValidationFailed("stepper_port must be 1 or 2"));
        }
        if !(1..=4).contains(&hat.pump_port) {
            return Err(ConfigError::ValidationFailed("pump_port must be 1-4"));
        }
        if hat.stepper_dc_ports().contains(&hat.pump_port) {
            return Err(ConfigError::ValidationFailed(
                "pump_port overlaps the stepper's ports",
            ));
        }
        if hat.steps_per_revolution == 0 || hat.stepper_rpm == 0 {
            return Err(ConfigError::ValidationFailed(
                "steps_per_revolution and stepper_rpm must be > 0",
            ));
        }
        if !(24..=1600).contains(&hat.pwm_frequency_hz) {
            return Err(ConfigError::ValidationFailed(
                "pwm_frequency_hz out of range",
            ));
        }
        Ok(())
    }

    pub fn hold_duration(&self) -> Duration {
        Duration::from_secs_f64(self.hold_duration_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SystemConfig::default().validate().unwrap();
    }

    #[test]
    fn serde_roundtrip() {
        let c = SystemConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: SystemConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c, c2);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let c: SystemConfig =
            serde_json::from_str(r#"{ "interval_secs": 60, "telemetry": null }"#).unwrap();
        assert_eq!(c.interval_secs, 60);
        assert!(c.telemetry.is_none());
        assert_eq!(c.motor_hat.pump_port, 3);
    }

    #[test]
    fn degenerate_calibration_is_rejected_at_startup() {
        let mut c = SystemConfig::default();
        c.position_calibration.in_max = c.position_calibration.in_min;
        assert_eq!(
            c.validate(),
            Err(ConfigError::DegenerateCalibration("position"))
        );
    }

    #[test]
    fn pump_cannot_share_stepper_ports() {
        let mut c = SystemConfig::default();
        c.motor_hat.pump_port = 2;
        assert!(matches!(c.validate(), Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut c = SystemConfig::default();
        c.interval_secs = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn timing_ratios_make_sense() {
        let c = SystemConfig::default();
        let ramp_secs = f64::from(c.ramp_steps) * c.ramp_step_delay_ms as f64 / 1000.0;
        assert!(
            c.hold_duration_secs + ramp_secs < c.interval_secs as f64,
            "a cycle's pump phase must fit inside one interval"
        );
    }
}
