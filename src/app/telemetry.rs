//! Best-effort telemetry for each reading.
//!
//! Telemetry is observability, not control: a send failure is logged and
//! dropped, and never reaches the cycle result.

use log::warn;

use crate::config::TelemetryConfig;

use super::model::{NormalizedLevel, TideReading};
use super::ports::TelemetrySink;

/// Wraps a [`TelemetrySink`] with the configured OSC addresses.
pub struct TelemetryEmitter<T: TelemetrySink> {
    sink: T,
    address: String,
    mapped_address: Option<String>,
    failures: u64,
}

impl<T: TelemetrySink> TelemetryEmitter<T> {
    pub fn new(sink: T, address: impl Into<String>, mapped_address: Option<String>) -> Self {
        Self {
            sink,
            address: address.into(),
            mapped_address,
            failures: 0,
        }
    }

    /// Emitter using the addresses from `config`, or the defaults when
    /// telemetry is disabled.
    pub fn from_config(sink: T, config: Option<&TelemetryConfig>) -> Self {
        let defaults = TelemetryConfig::default();
        let cfg = config.unwrap_or(&defaults);
        Self::new(sink, cfg.address.clone(), cfg.mapped_address.clone())
    }

    /// Send the raw level, then the normalized level if a second address
    /// is configured.
    pub fn emit(&mut self, reading: &TideReading, level: NormalizedLevel) {
        let raw_addr = self.address.clone();
        self.send(&raw_addr, reading.raw_value as f32);
        if let Some(addr) = self.mapped_address.clone() {
            self.send(&addr, level.value() as f32);
        }
    }

    /// Sends that have failed since startup.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn sink(&self) -> &T {
        &self.sink
    }

    fn send(&mut self, address: &str, value: f32) {
        if let Err(e) = self.sink.send(address, value) {
            self.failures += 1;
            warn!("TELEM | {address} not sent: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TelemetryError;
    use chrono::Utc;

    #[derive(Default)]
    struct Capture {
        sent: Vec<(String, f32)>,
        fail: bool,
    }

    impl TelemetrySink for Capture {
        fn send(&mut self, address: &str, value: f32) -> Result<(), TelemetryError> {
            if self.fail {
                return Err(TelemetryError::Io("host unreachable".into()));
            }
            self.sent.push((address.to_string(), value));
            Ok(())
        }
    }

    fn reading() -> TideReading {
        TideReading {
            raw_value: 1.625,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn raw_and_mapped_levels_go_to_their_addresses() {
        let mut em = TelemetryEmitter::new(
            Capture::default(),
            "/pySend",
            Some("/pySend/mapped".into()),
        );
        em.emit(&reading(), NormalizedLevel::new(64.0));
        assert_eq!(
            em.sink().sent,
            vec![
                ("/pySend".to_string(), 1.625),
                ("/pySend/mapped".to_string(), 64.0)
            ]
        );
    }

    #[test]
    fn failures_are_counted_not_raised() {
        let mut em = TelemetryEmitter::new(
            Capture {
                fail: true,
                ..Capture::default()
            },
            "/pySend",
            None,
        );
        em.emit(&reading(), NormalizedLevel::new(64.0));
        em.emit(&reading(), NormalizedLevel::new(64.0));
        assert_eq!(em.failures(), 2);
    }
}
