//! Controller — the hexagonal core.
//!
//! [`Controller`] owns the sequencer, the calibrations, and exclusive
//! handles to the tide source, the actuators (behind a [`ShutdownGuard`]),
//! and telemetry.  One call to [`Controller::run_one_cycle`] is one
//! fetch → map → telemetry → actuate pass.
//!
//! ```text
//!   TideSource ──▶ ┌──────────────────────────┐ ──▶ TelemetrySink
//!                  │        Controller         │
//! ActuatorDriver ◀─│  Mapper · Sequencer       │
//!                  └──────────────────────────┘
//! ```

use core::time::Duration;

use chrono::{DateTime, Utc};
use log::{error, info, warn};

use crate::config::SystemConfig;
use crate::error::{ConfigError, Error, ErrorKind};
use crate::fsm::ActuatorState;
use crate::fsm::sequencer::{Sequencer, SequencerSettings};
use crate::mapper::Calibration;
use crate::safety::ShutdownGuard;
use crate::scheduler::Verdict;
use crate::shutdown::ShutdownSignal;

use super::model::{ActuationPlan, CycleResult, NormalizedLevel};
use super::ports::{ActuatorDriver, TelemetrySink, TideSource};
use super::telemetry::TelemetryEmitter;

/// The three calibrations a cycle maps through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mapping {
    pub level: Calibration,
    pub position: Calibration,
    pub flow: Calibration,
}

impl Mapping {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            level: config.level_calibration,
            position: config.position_calibration,
            flow: config.flow_calibration,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.level.validate("level")?;
        self.position.validate("position")?;
        self.flow.validate("flow")
    }
}

/// Owns every per-process resource the cycle touches.
pub struct Controller<S: TideSource, A: ActuatorDriver, T: TelemetrySink> {
    source: S,
    actuators: ShutdownGuard<A>,
    telemetry: TelemetryEmitter<T>,
    sequencer: Sequencer,
    mapping: Mapping,
    hold_duration: Duration,
    signal: ShutdownSignal,
    max_consecutive_failures: u32,
    consecutive_actuator_failures: u32,
    cycle_count: u64,
    last_success: Option<DateTime<Utc>>,
}

impl<S: TideSource, A: ActuatorDriver, T: TelemetrySink> Controller<S, A, T> {
    /// Build the controller. The actuator handle is wrapped in a
    /// [`ShutdownGuard`] immediately, so every channel is released when the
    /// controller is dropped, whatever the exit path.
    ///
    /// Degenerate calibrations are rejected here rather than per cycle.
    pub fn new(
        source: S,
        actuators: A,
        telemetry: TelemetryEmitter<T>,
        config: &SystemConfig,
        signal: ShutdownSignal,
    ) -> Result<Self, ConfigError> {
        let actuators = ShutdownGuard::new(actuators);
        let mapping = Mapping::from_config(config);
        mapping.validate()?;
        Ok(Self {
            source,
            actuators,
            telemetry,
            sequencer: Sequencer::new(SequencerSettings::from_config(config)),
            mapping,
            hold_duration: config.hold_duration(),
            signal,
            max_consecutive_failures: config.max_consecutive_actuator_failures,
            consecutive_actuator_failures: 0,
            cycle_count: 0,
            last_success: None,
        })
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one fetch → map → telemetry → actuate pass.
    ///
    /// Fetch and mapping failures abort before any actuator command.
    /// Actuator failures have already released every channel by the time
    /// they are reported here.
    pub fn run_one_cycle(&mut self) -> CycleResult {
        self.cycle_count += 1;
        let n = self.cycle_count;

        match self.try_cycle() {
            Ok(plan) => {
                self.consecutive_actuator_failures = 0;
                self.last_success = Some(Utc::now());
                info!(
                    "CYCLE | #{n} complete | steps={} flow={} hold={:.1}s",
                    plan.position_steps,
                    plan.flow_rate,
                    plan.hold_duration.as_secs_f64()
                );
                CycleResult::ok()
            }
            Err(e) => {
                let kind = e.kind();
                match kind {
                    ErrorKind::ActuatorCommand => {
                        self.consecutive_actuator_failures += 1;
                        error!(
                            "CYCLE | #{n} actuator fault ({} consecutive): {e}",
                            self.consecutive_actuator_failures
                        );
                    }
                    ErrorKind::Interrupted => info!("CYCLE | #{n} interrupted"),
                    _ => warn!("CYCLE | #{n} aborted, no actuation: {e}"),
                }
                CycleResult::failed(kind)
            }
        }
    }

    /// Scheduler job: run a cycle and decide whether to keep going.
    ///
    /// Only an actuator fault can halt; fetch and mapping failures wait
    /// for the next trigger.
    pub fn cycle(&mut self) -> Verdict {
        match self.run_one_cycle().error {
            Some(ErrorKind::ActuatorCommand) if self.should_halt() => {
                error!(
                    "CYCLE | {} consecutive actuator failures exceed limit of {}, halting",
                    self.consecutive_actuator_failures, self.max_consecutive_failures
                );
                Verdict::Halt
            }
            _ => Verdict::Continue,
        }
    }

    fn try_cycle(&mut self) -> Result<ActuationPlan, Error> {
        self.signal.check()?;

        let reading = self.source.fetch()?;
        let level = NormalizedLevel::from_reading(&reading, &self.mapping.level)?;
        info!(
            "CYCLE | #{} level={:.3} mapped={}",
            self.cycle_count,
            reading.raw_value,
            level.value()
        );
        self.telemetry.emit(&reading, level);

        let plan = ActuationPlan::derive(
            level,
            &self.mapping.position,
            &self.mapping.flow,
            self.hold_duration,
        )?;
        info!(
            "CYCLE | #{} stepping {} steps, pump rate {}",
            self.cycle_count, plan.position_steps, plan.flow_rate
        );

        self.sequencer
            .run(&plan, &mut *self.actuators, &self.signal)?;
        Ok(plan)
    }

    // ── Queries ───────────────────────────────────────────────

    /// Whether the consecutive actuator failure count exceeds the limit.
    pub fn should_halt(&self) -> bool {
        self.consecutive_actuator_failures > self.max_consecutive_failures
    }

    pub fn state(&self) -> ActuatorState {
        self.sequencer.state()
    }

    /// Net steps the plate sits away from home.
    pub fn position_offset(&self) -> i64 {
        self.sequencer.offset()
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn consecutive_actuator_failures(&self) -> u32 {
        self.consecutive_actuator_failures
    }

    /// Completion time of the last successful cycle, for observability only.
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Release every channel now. Dropping the controller afterwards does
    /// not release a second time.
    pub fn shutdown(&mut self) {
        self.actuators.shutdown();
    }
}
