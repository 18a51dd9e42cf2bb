//! Fail-safe release of every actuator channel.
//!
//! ## Release lifecycle
//!
//! 1. The controller (or `main`, for bench routines) wraps the actuator
//!    handle in a [`ShutdownGuard`] as soon as the motor controller is opened.
//! 2. Mid-cycle faults call [`release_all`] directly; the process keeps
//!    running and the guard stays armed.
//! 3. When the guard goes out of scope it runs [`release_all`] exactly
//!    once. That includes a panic unwinding the cycle worker.
//!
//! Releasing is idempotent: a channel that is already de-energised is
//! simply commanded off again.

use core::ops::{Deref, DerefMut};

use log::{error, info};

use crate::app::ports::{ActuatorDriver, Channel};

/// Command every channel to release. Individual failures are logged and do
/// not stop the remaining channels from being attempted.
///
/// Returns the number of channels that failed to release.
pub fn release_all(hw: &mut (impl ActuatorDriver + ?Sized)) -> usize {
    let mut failed = 0;
    for channel in Channel::ALL {
        if let Err(e) = hw.release(channel) {
            error!("SAFETY: release {channel:?} failed: {e}");
            failed += 1;
        }
    }
    failed
}

/// Scoped owner of the actuator handle that de-energises on drop.
pub struct ShutdownGuard<A: ActuatorDriver> {
    driver: A,
    fired: bool,
}

impl<A: ActuatorDriver> ShutdownGuard<A> {
    pub fn new(driver: A) -> Self {
        info!("SAFETY: shutdown guard armed");
        Self {
            driver,
            fired: false,
        }
    }

    /// Run the exit release now instead of at drop. Later calls and the
    /// eventual drop do nothing.
    pub fn shutdown(&mut self) {
        if self.fired {
            return;
        }
        self.fired = true;
        let failed = release_all(&mut self.driver);
        if failed == 0 {
            info!("SAFETY: all channels released");
        } else {
            error!("SAFETY: {failed} channel(s) failed to release");
        }
    }

    /// Whether the exit release has already run.
    pub fn has_fired(&self) -> bool {
        self.fired
    }
}

impl<A: ActuatorDriver> Deref for ShutdownGuard<A> {
    type Target = A;

    fn deref(&self) -> &A {
        &self.driver
    }
}

impl<A: ActuatorDriver> DerefMut for ShutdownGuard<A> {
    fn deref_mut(&mut self) -> &mut A {
        &mut self.driver
    }
}

impl<A: ActuatorDriver> Drop for ShutdownGuard<A> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
