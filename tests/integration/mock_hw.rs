//! Mock adapters for integration tests.
//!
//! Records every actuator call and telemetry message so tests can assert
//! on the full command history without touching the I²C bus or the
//! network.  Histories live behind `Arc<Mutex<_>>` so they stay readable
//! after the controller has moved into the scheduler's worker thread.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tidemotor::app::model::TideReading;
use tidemotor::app::ports::{ActuatorDriver, Channel, Direction, StepMode, TelemetrySink, TideSource};
use tidemotor::error::{ActuatorError, FetchError, TelemetryError};
use tidemotor::shutdown::ShutdownTrigger;

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCall {
    Move { steps: u32, direction: Direction },
    SetRate { channel: Channel, rate: u8 },
    Release(Channel),
}

pub type CallLog = Arc<Mutex<Vec<ActuatorCall>>>;

// ── MockActuators ─────────────────────────────────────────────

pub struct MockActuators {
    pub calls: CallLog,
    /// Fail every `set_rate` on the flow channel.
    pub fail_rate: bool,
    /// Fire this trigger on the first `move_by`, as if Ctrl-C arrived mid-move.
    pub interrupt_on_move: Option<ShutdownTrigger>,
}

#[allow(dead_code)]
impl MockActuators {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_rate: false,
            interrupt_on_move: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_rate: true,
            ..Self::new()
        }
    }

    pub fn interrupting(trigger: ShutdownTrigger) -> Self {
        Self {
            interrupt_on_move: Some(trigger),
            ..Self::new()
        }
    }

    /// Shared handle to the call history.
    pub fn log(&self) -> CallLog {
        Arc::clone(&self.calls)
    }
}

impl Default for MockActuators {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorDriver for MockActuators {
    fn move_by(
        &mut self,
        steps: u32,
        direction: Direction,
        _mode: StepMode,
    ) -> Result<(), ActuatorError> {
        self.calls
            .lock()
            .unwrap()
            .push(ActuatorCall::Move { steps, direction });
        if let Some(trigger) = self.interrupt_on_move.take() {
            trigger.trigger();
        }
        Ok(())
    }

    fn set_rate(&mut self, channel: Channel, rate: u8) -> Result<(), ActuatorError> {
        self.calls
            .lock()
            .unwrap()
            .push(ActuatorCall::SetRate { channel, rate });
        if self.fail_rate {
            Err(ActuatorError::BusWriteFailed)
        } else {
            Ok(())
        }
    }

    fn release(&mut self, channel: Channel) -> Result<(), ActuatorError> {
        self.calls.lock().unwrap().push(ActuatorCall::Release(channel));
        Ok(())
    }
}

#[allow(dead_code)]
pub fn is_motion(call: &ActuatorCall) -> bool {
    matches!(
        call,
        ActuatorCall::Move { .. } | ActuatorCall::SetRate { .. }
    )
}

// ── MockTideSource ────────────────────────────────────────────

/// Returns queued results in order, then the fallback level forever.
pub struct MockTideSource {
    pub queue: VecDeque<Result<f64, FetchError>>,
    pub fallback: f64,
    pub fetches: Arc<Mutex<u32>>,
}

#[allow(dead_code)]
impl MockTideSource {
    pub fn level(value: f64) -> Self {
        Self {
            queue: VecDeque::new(),
            fallback: value,
            fetches: Arc::new(Mutex::new(0)),
        }
    }

    pub fn then(mut self, result: Result<f64, FetchError>) -> Self {
        self.queue.push_back(result);
        self
    }
}

impl TideSource for MockTideSource {
    fn fetch(&mut self) -> Result<TideReading, FetchError> {
        *self.fetches.lock().unwrap() += 1;
        let value = self.queue.pop_front().unwrap_or(Ok(self.fallback))?;
        Ok(TideReading {
            raw_value: value,
            timestamp: Utc::now(),
        })
    }
}

// ── CaptureSink ───────────────────────────────────────────────

pub type SentLog = Arc<Mutex<Vec<(String, f32)>>>;

pub struct CaptureSink {
    pub sent: SentLog,
}

#[allow(dead_code)]
impl CaptureSink {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn log(&self) -> SentLog {
        Arc::clone(&self.sent)
    }
}

impl TelemetrySink for CaptureSink {
    fn send(&mut self, address: &str, value: f32) -> Result<(), TelemetryError> {
        self.sent.lock().unwrap().push((address.to_string(), value));
        Ok(())
    }
}
