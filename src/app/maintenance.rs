//! Bench routines run from the command line instead of the scheduler.
//!
//! - **prime**: run the pump flat out to fill the tubing.
//! - **flow test**: pulse the pump on and off at a fixed rate.
//! - **travel test**: drive the plate the full rail length out and back.
//!
//! Each routine runs until its repeat count is reached or shutdown is
//! requested.  An interrupt is the normal way to end one and is reported
//! as success.  Every channel is released on the way out.

use core::time::Duration;

use log::{info, warn};

use crate::config::SystemConfig;
use crate::error::Error;
use crate::fsm::sequencer::move_in_chunks;
use crate::safety::release_all;
use crate::shutdown::ShutdownSignal;

use super::ports::{ActuatorDriver, Channel, Direction, StepMode};

/// Parameters for the travel test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelTest {
    pub steps: u32,
    pub away: Direction,
    pub mode: StepMode,
    pub chunk_steps: u32,
    pub pause: Duration,
}

impl TravelTest {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            steps: config.travel_test_steps,
            away: config.away_direction,
            mode: config.step_mode,
            chunk_steps: config.move_chunk_steps,
            pause: Duration::from_secs_f64(config.travel_test_pause_secs),
        }
    }
}

/// Run the pump at `rate` for `duration`, or until interrupted if `None`.
pub fn prime(
    hw: &mut (impl ActuatorDriver + ?Sized),
    rate: u8,
    duration: Option<Duration>,
    signal: &ShutdownSignal,
) -> Result<(), Error> {
    info!("MAINT | priming at rate {rate}");
    let result = (|| -> Result<(), Error> {
        hw.set_rate(Channel::Flow, rate)?;
        match duration {
            Some(d) => signal.wait(d),
            None => {
                signal.wait_forever();
                Err(Error::Interrupted)
            }
        }
    })();
    finish("prime", hw, result)
}

/// Alternate `run` at `rate` with `pause` released, `repeats` times or
/// until interrupted.
pub fn flow_test(
    hw: &mut (impl ActuatorDriver + ?Sized),
    rate: u8,
    run: Duration,
    pause: Duration,
    repeats: Option<u32>,
    signal: &ShutdownSignal,
) -> Result<(), Error> {
    let result = (|| -> Result<(), Error> {
        let mut n = 0u32;
        while repeats.is_none_or(|max| n < max) {
            n += 1;
            info!("MAINT | flow test #{n}: rate {rate} for {:.1}s", run.as_secs_f64());
            hw.set_rate(Channel::Flow, rate)?;
            signal.wait(run)?;
            hw.release(Channel::Flow)?;
            signal.wait(pause)?;
        }
        Ok(())
    })();
    finish("flow test", hw, result)
}

/// Drive the full travel out and back, `repeats` times or until
/// interrupted.
pub fn travel_test(
    hw: &mut (impl ActuatorDriver + ?Sized),
    test: &TravelTest,
    repeats: Option<u32>,
    signal: &ShutdownSignal,
) -> Result<(), Error> {
    let mut offset: i64 = 0;
    let result = (|| -> Result<(), Error> {
        let mut n = 0u32;
        while repeats.is_none_or(|max| n < max) {
            n += 1;
            info!("MAINT | travel test #{n}: {} steps out", test.steps);
            move_in_chunks(hw, test.steps, test.away, test.mode, test.chunk_steps, signal, |s| {
                offset += i64::from(s);
            })?;
            signal.wait(test.pause)?;
            info!("MAINT | travel test #{n}: {} steps back", test.steps);
            move_in_chunks(
                hw,
                test.steps,
                test.away.reversed(),
                test.mode,
                test.chunk_steps,
                signal,
                |s| offset -= i64::from(s),
            )?;
            hw.release(Channel::Position)?;
            signal.wait(test.pause)?;
        }
        Ok(())
    })();
    if offset != 0 {
        warn!("MAINT | travel test stopped {offset} steps from home");
    }
    finish("travel test", hw, result)
}

fn finish(
    name: &str,
    hw: &mut (impl ActuatorDriver + ?Sized),
    result: Result<(), Error>,
) -> Result<(), Error> {
    release_all(hw);
    match result {
        Ok(()) => {
            info!("MAINT | {name} complete");
            Ok(())
        }
        Err(Error::Interrupted) => {
            info!("MAINT | {name} stopped");
            Ok(())
        }
        Err(e) => {
            warn!("MAINT | {name} failed: {e}");
            Err(e)
        }
    }
}
