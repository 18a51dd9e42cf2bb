//! One actuation cycle: move out, release, pump, return, release.
//!
//! The sequencer is the only owner of [`ActuatorState`] and of the plate's
//! step offset from home.  The driver it commands is a stateless executor.
//!
//! Motion is issued in chunks of `chunk_steps` with a shutdown check
//! between chunks, and every wait (ramp, hold) is an interruptible wait on
//! the [`ShutdownSignal`], so an interrupt is observed within one chunk.
//! Any error, actuator fault or interrupt, releases every channel before
//! it is returned.

use core::time::Duration;

use log::{info, warn};

use super::ActuatorState;
use crate::app::model::ActuationPlan;
use crate::app::ports::{ActuatorDriver, Channel, Direction, StepMode};
use crate::config::SystemConfig;
use crate::error::Error;
use crate::safety::release_all;
use crate::shutdown::ShutdownSignal;

/// Tunables for the choreography. Calibration lives in the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerSettings {
    /// Direction that moves the plate away from home.
    pub away: Direction,
    pub mode: StepMode,
    /// Steps per `move_by` call; shutdown is checked between chunks.
    pub chunk_steps: u32,
    /// Pump rate the ramp starts from.
    pub ramp_floor: u8,
    /// Number of increments from floor to target; 0 sets the target directly.
    pub ramp_steps: u16,
    pub ramp_step_delay: Duration,
}

impl SequencerSettings {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            away: config.away_direction,
            mode: config.step_mode,
            chunk_steps: config.move_chunk_steps,
            ramp_floor: config.ramp_floor,
            ramp_steps: config.ramp_steps,
            ramp_step_delay: Duration::from_millis(config.ramp_step_delay_ms),
        }
    }
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self::from_config(&SystemConfig::default())
    }
}

/// Rates visited while ramping the pump from `floor` up to `target`.
///
/// Always ends on `target`. A target at or below the floor, or a zero
/// step count, yields the target alone.
pub fn ramp_rates(floor: u8, target: u8, steps: u16) -> Vec<u8> {
    if steps == 0 || target <= floor {
        return vec![target];
    }
    let span = u32::from(target - floor);
    let steps = u32::from(steps);
    (1..=steps)
        .map(|i| floor + (span * i / steps) as u8)
        .collect()
}

/// Issue `steps` in chunks, checking `signal` before each chunk.
/// `on_chunk` is told how many steps each completed chunk moved.
pub fn move_in_chunks(
    hw: &mut (impl ActuatorDriver + ?Sized),
    steps: u32,
    direction: Direction,
    mode: StepMode,
    chunk_steps: u32,
    signal: &ShutdownSignal,
    mut on_chunk: impl FnMut(u32),
) -> Result<(), Error> {
    let chunk = chunk_steps.max(1);
    let mut remaining = steps;
    while remaining > 0 {
        signal.check()?;
        let n = remaining.min(chunk);
        hw.move_by(n, direction, mode)?;
        on_chunk(n);
        remaining -= n;
    }
    Ok(())
}

/// The actuation state machine.
pub struct Sequencer {
    settings: SequencerSettings,
    state: ActuatorState,
    /// Steps the plate currently sits away from home (positive = away).
    offset: i64,
}

impl Sequencer {
    /// Starts `AtHome`: there is no homing switch, so the plate is assumed
    /// to be at home when the process starts.
    pub fn new(settings: SequencerSettings) -> Self {
        Self {
            settings,
            state: ActuatorState::AtHome,
            offset: 0,
        }
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    /// Net steps away from home.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Run one full cycle for `plan`.
    ///
    /// On any error every channel is released and the state becomes
    /// `Deenergized`.  If a previous cycle was aborted away from home, the
    /// plate is returned before the new cycle starts.
    pub fn run(
        &mut self,
        plan: &ActuationPlan,
        hw: &mut (impl ActuatorDriver + ?Sized),
        signal: &ShutdownSignal,
    ) -> Result<(), Error> {
        match self.sequence(plan, hw, signal) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Sequencer: aborting in {}: {e}", self.state.name());
                self.abort(hw);
                Err(e)
            }
        }
    }

    /// Release every channel and enter `Deenergized`.
    pub fn abort(&mut self, hw: &mut (impl ActuatorDriver + ?Sized)) {
        release_all(hw);
        self.transition(ActuatorState::Deenergized);
    }

    fn sequence(
        &mut self,
        plan: &ActuationPlan,
        hw: &mut (impl ActuatorDriver + ?Sized),
        signal: &ShutdownSignal,
    ) -> Result<(), Error> {
        signal.check()?;

        if self.offset != 0 {
            warn!(
                "Sequencer: plate {} steps from home after an aborted cycle, returning first",
                self.offset
            );
            self.return_home(hw, signal)?;
        } else if self.state == ActuatorState::Deenergized {
            self.transition(ActuatorState::AtHome);
        }

        // ── Out ────────────────────────────────────────────────
        if plan.position_steps > 0 {
            self.transition(ActuatorState::Moving);
            let SequencerSettings {
                away,
                mode,
                chunk_steps,
                ..
            } = self.settings;
            let offset = &mut self.offset;
            move_in_chunks(hw, plan.position_steps, away, mode, chunk_steps, signal, |n| {
                *offset += i64::from(n);
            })?;
            self.transition(ActuatorState::IdleEnergized);
            // Coils would overheat holding position through the pump phase.
            hw.release(Channel::Position)?;
        }

        // ── Pump ───────────────────────────────────────────────
        self.transition(ActuatorState::Holding);
        self.pump(plan, hw, signal)?;

        // ── Back ───────────────────────────────────────────────
        if self.offset == 0 {
            self.transition(ActuatorState::AtHome);
        } else {
            self.return_home(hw, signal)?;
        }
        Ok(())
    }

    fn pump(
        &mut self,
        plan: &ActuationPlan,
        hw: &mut (impl ActuatorDriver + ?Sized),
        signal: &ShutdownSignal,
    ) -> Result<(), Error> {
        let rates = ramp_rates(self.settings.ramp_floor, plan.flow_rate, self.settings.ramp_steps);
        for (i, rate) in rates.into_iter().enumerate() {
            if i > 0 {
                signal.wait(self.settings.ramp_step_delay)?;
            }
            hw.set_rate(Channel::Flow, rate)?;
        }
        info!(
            "Sequencer: pump at {} for {:.1}s",
            plan.flow_rate,
            plan.hold_duration.as_secs_f64()
        );
        signal.wait(plan.hold_duration)?;
        hw.release(Channel::Flow)?;
        Ok(())
    }

    fn return_home(
        &mut self,
        hw: &mut (impl ActuatorDriver + ?Sized),
        signal: &ShutdownSignal,
    ) -> Result<(), Error> {
        self.transition(ActuatorState::Returning);
        let (direction, sign) = if self.offset > 0 {
            (self.settings.away.reversed(), -1)
        } else {
            (self.settings.away, 1)
        };
        let steps = u32::try_from(self.offset.unsigned_abs()).unwrap_or(u32::MAX);
        let SequencerSettings {
            mode, chunk_steps, ..
        } = self.settings;
        let offset = &mut self.offset;
        move_in_chunks(hw, steps, direction, mode, chunk_steps, signal, |n| {
            *offset += sign * i64::from(n);
        })?;
        hw.release(Channel::Position)?;
        self.transition(ActuatorState::AtHome);
        Ok(())
    }

    fn transition(&mut self, next: ActuatorState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        info!("Sequencer: {} -> {}", self.state.name(), next.name());
        self.state = next;
    }
}
