//! Long-running mode: hand the controller to the scheduler and wait for
//! an interrupt or a halt.

use log::{error, info};

use crate::config::SystemConfig;
use crate::scheduler::{CycleScheduler, ScheduleConfig, StopReason};
use crate::shutdown::ShutdownSignal;

use super::controller::Controller;
use super::ports::{ActuatorDriver, TelemetrySink, TideSource};

/// How a scheduled run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Shutdown was requested; the in-flight cycle (if any) was aborted
    /// and every channel released.
    Interrupted,
    /// Consecutive actuator failures exceeded the configured limit.
    Halted,
    /// The cycle worker died or could not be started.
    WorkerFailed,
}

impl RunOutcome {
    /// Process exit status: 0 for a requested shutdown, 1 otherwise.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Interrupted => 0,
            Self::Halted | Self::WorkerFailed => 1,
        }
    }
}

/// Run cycles on the configured interval until `signal` fires or the
/// controller asks to halt.
///
/// The controller moves into the worker thread and is dropped there when
/// the run ends, which releases every actuator channel.
pub fn run_until_shutdown<S, A, T>(
    controller: Controller<S, A, T>,
    config: &SystemConfig,
    signal: &ShutdownSignal,
) -> RunOutcome
where
    S: TideSource + Send + 'static,
    A: ActuatorDriver + Send + 'static,
    T: TelemetrySink + Send + 'static,
{
    let scheduler = CycleScheduler::new(ScheduleConfig {
        interval: config.interval(),
        run_immediately: config.run_immediately,
    });

    let mut controller = controller;
    let outcome = match scheduler.run(move || controller.cycle(), signal, config.shutdown_grace()) {
        Ok(StopReason::Shutdown) => RunOutcome::Interrupted,
        Ok(StopReason::Halted) => RunOutcome::Halted,
        Ok(StopReason::WorkerExited) => {
            error!("Cycle worker exited unexpectedly");
            RunOutcome::WorkerFailed
        }
        Err(e) => {
            error!("Failed to start cycle worker: {e}");
            RunOutcome::WorkerFailed
        }
    };
    info!("Run finished: {outcome:?}");
    outcome
}
