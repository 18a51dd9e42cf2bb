//! Log-based telemetry sink.
//!
//! Implements [`TelemetrySink`] by writing each value to the log.  Used
//! when OSC telemetry is disabled or its socket could not be set up, so
//! the controller always has a sink and the readings still show up in
//! the journal.

use log::info;

use crate::app::ports::TelemetrySink;
use crate::error::TelemetryError;

/// Adapter that logs every telemetry value.
pub struct LogTelemetrySink;

impl LogTelemetrySink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogTelemetrySink {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink for LogTelemetrySink {
    fn send(&mut self, address: &str, value: f32) -> Result<(), TelemetryError> {
        info!("TELEM | {address} {value:.3}");
        Ok(())
    }
}
