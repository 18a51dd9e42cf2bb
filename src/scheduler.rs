//! Fixed-interval cycle scheduler.
//!
//! One trigger loop fires on a fixed interval (and optionally once at
//! start); one worker thread owns the job and runs it synchronously.
//!
//! ```text
//! ┌──────────────┐  fire()   ┌───────────────┐  work   ┌──────────────────┐
//! │ tick(interval)│─────────▶│ busy? ─yes─▶ skip + warn │                  │
//! │ run_immediately│         │   │no                    │  worker thread   │
//! └──────────────┘           │   └────────────────────▶│  job() → Verdict │
//!        ▲                   └───────────────┘         └────────┬─────────┘
//!        │ select!                                              │ Halt
//! ┌──────┴────────┐                                             ▼
//! │ shutdown signal│◀─────────────── halted channel ─────────────┘
//! └───────────────┘
//! ```
//!
//! ## Overlap policy
//!
//! **Skip.**  A trigger that fires while a cycle is still running is
//! dropped with a warning; cycles never run concurrently and triggers are
//! never queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, select};
use log::{info, warn};

use crate::shutdown::ShutdownSignal;

/// What the job wants the scheduler to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Halt,
}

/// Result of a single trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// The job was handed to the worker.
    Dispatched,
    /// A cycle was still running; the trigger was dropped.
    Skipped,
    /// The worker has exited.
    WorkerGone,
}

/// Why the scheduler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown signal observed.
    Shutdown,
    /// The job returned [`Verdict::Halt`].
    Halted,
    /// The worker thread ended unexpectedly (panic inside the job).
    WorkerExited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub interval: Duration,
    pub run_immediately: bool,
}

/// Drives a job on a fixed interval with skip-on-overlap.
pub struct CycleScheduler {
    config: ScheduleConfig,
}

impl CycleScheduler {
    pub fn new(config: ScheduleConfig) -> Self {
        Self { config }
    }

    /// Spawn the worker that owns `job`. Triggers are issued through the
    /// returned handle.
    pub fn start<J>(&self, mut job: J) -> std::io::Result<WorkerHandle>
    where
        J: FnMut() -> Verdict + Send + 'static,
    {
        let (work_tx, work_rx) = crossbeam_channel::bounded::<()>(1);
        let (halt_tx, halt_rx) = crossbeam_channel::bounded::<()>(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);
        let busy = Arc::new(AtomicBool::new(false));
        let worker_busy = Arc::clone(&busy);

        let thread = thread::Builder::new()
            .name("tide-cycle".into())
            .spawn(move || {
                for () in work_rx.iter() {
                    let verdict = job();
                    worker_busy.store(false, Ordering::Release);
                    if verdict == Verdict::Halt {
                        let _ = halt_tx.send(());
                        break;
                    }
                }
                // Dropping the job drops whatever it owns (the controller and
                // its shutdown guard) before the main thread is told we are done.
                drop(job);
                drop(done_tx);
            })?;

        info!("Scheduler: worker started");
        Ok(WorkerHandle {
            work_tx: Some(work_tx),
            halt_rx,
            done_rx,
            busy,
            thread: Some(thread),
        })
    }

    /// Run `job` until shutdown or a halt, then wait up to `grace` for an
    /// in-flight cycle to finish.
    pub fn run<J>(
        &self,
        job: J,
        signal: &ShutdownSignal,
        grace: Duration,
    ) -> std::io::Result<StopReason>
    where
        J: FnMut() -> Verdict + Send + 'static,
    {
        let mut handle = self.start(job)?;
        info!(
            "Scheduler: every {}s (run immediately: {})",
            self.config.interval.as_secs(),
            self.config.run_immediately
        );

        if self.config.run_immediately {
            handle.fire();
        }

        let ticker = crossbeam_channel::tick(self.config.interval);
        let halted = handle.halted().clone();
        let reason = loop {
            select! {
                recv(ticker) -> _ => {
                    if handle.fire() == FireOutcome::WorkerGone {
                        break StopReason::WorkerExited;
                    }
                }
                recv(signal.receiver()) -> _ => break StopReason::Shutdown,
                recv(halted) -> msg => {
                    break match msg {
                        Ok(()) => StopReason::Halted,
                        Err(_) => StopReason::WorkerExited,
                    };
                }
            }
        };

        info!("Scheduler: stopping ({reason:?})");
        handle.finish(grace);
        Ok(reason)
    }
}

/// Trigger side of a running worker.
pub struct WorkerHandle {
    work_tx: Option<Sender<()>>,
    halt_rx: Receiver<()>,
    done_rx: Receiver<()>,
    busy: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Hand one cycle to the worker, or skip if one is still running.
    pub fn fire(&self) -> FireOutcome {
        let Some(work_tx) = &self.work_tx else {
            return FireOutcome::WorkerGone;
        };
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Scheduler: previous cycle still running, skipping trigger");
            return FireOutcome::Skipped;
        }
        match work_tx.try_send(()) {
            Ok(()) => FireOutcome::Dispatched,
            Err(TrySendError::Full(())) => {
                // Unreachable while `busy` guards the slot; treat as overlap.
                warn!("Scheduler: work slot occupied, skipping trigger");
                FireOutcome::Skipped
            }
            Err(TrySendError::Disconnected(())) => {
                self.busy.store(false, Ordering::Release);
                FireOutcome::WorkerGone
            }
        }
    }

    /// Whether a cycle is currently running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Receives `()` when the job halts; disconnects if the worker dies.
    pub fn halted(&self) -> &Receiver<()> {
        &self.halt_rx
    }

    /// Stop accepting work and wait up to `grace` for the worker to exit.
    /// Returns `false` if the worker was abandoned mid-cycle.
    pub fn finish(&mut self, grace: Duration) -> bool {
        self.work_tx.take();
        match self.done_rx.recv_timeout(grace) {
            Err(RecvTimeoutError::Disconnected) | Ok(()) => {
                if let Some(thread) = self.thread.take() {
                    if thread.join().is_err() {
                        warn!("Scheduler: worker panicked");
                    }
                }
                info!("Scheduler: worker stopped");
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Scheduler: worker still busy after {:.1}s, abandoning it",
                    grace.as_secs_f64()
                );
                false
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // Let the worker drain and exit; never block in drop.
        self.work_tx.take();
    }
}
