//! Process-wide shutdown signal.
//!
//! A zero-capacity channel whose sender is dropped to signal shutdown.
//! Every clone of [`ShutdownSignal`] observes the disconnect at once, and
//! a timed wait on it doubles as an interruptible sleep:
//!
//! ```text
//! ctrlc handler ──trigger()──▶ [sender dropped]
//!                                   │
//!        ┌──────────────────────────┼──────────────────────┐
//!        ▼                          ▼                      ▼
//!   scheduler select!        sequencer wait()        prime wait_forever()
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::error::Error;

/// Create a connected trigger/signal pair.
pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = crossbeam_channel::bounded(0);
    (
        ShutdownTrigger {
            tx: Arc::new(Mutex::new(Some(tx))),
        },
        ShutdownSignal { rx },
    )
}

/// Fires the shutdown. Cheap to clone; firing more than once is a no-op.
#[derive(Clone)]
pub struct ShutdownTrigger {
    tx: Arc<Mutex<Option<Sender<()>>>>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let mut slot = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.take().is_some() {
            log::info!("Shutdown requested");
        }
    }
}

/// Observes the shutdown.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: Receiver<()>,
}

impl ShutdownSignal {
    /// True once the trigger has fired.
    pub fn is_triggered(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// `Err(Interrupted)` if shutdown has been requested.
    pub fn check(&self) -> Result<(), Error> {
        if self.is_triggered() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, returning early with `Err(Interrupted)` on shutdown.
    pub fn wait(&self, duration: Duration) -> Result<(), Error> {
        if duration.is_zero() {
            return self.check();
        }
        match self.rx.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => Ok(()),
            Err(RecvTimeoutError::Disconnected) | Ok(()) => Err(Error::Interrupted),
        }
    }

    /// Block until shutdown is requested.
    pub fn wait_forever(&self) {
        let _ = self.rx.recv();
    }

    /// Raw receiver for use in `select!`. Becomes ready (with `Err`) on shutdown.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}
