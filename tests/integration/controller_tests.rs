//! Controller cycle tests: the full fetch → map → telemetry → actuate path
//! against mock adapters, plus a loopback HTTP server for the real
//! tide source.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use tidemotor::adapters::tide_http::HttpTideSource;
use tidemotor::app::controller::Controller;
use tidemotor::app::ports::{Channel, Direction, TelemetrySink, TideSource};
use tidemotor::app::telemetry::TelemetryEmitter;
use tidemotor::config::SystemConfig;
use tidemotor::error::{ConfigError, ErrorKind, FetchError};
use tidemotor::fsm::ActuatorState;
use tidemotor::mapper::Calibration;
use tidemotor::scheduler::Verdict;
use tidemotor::shutdown::{self, ShutdownSignal};

use crate::mock_hw::{ActuatorCall, CaptureSink, MockActuators, MockTideSource, is_motion};

fn test_config() -> SystemConfig {
    SystemConfig {
        hold_duration_secs: 0.0,
        ramp_steps: 0,
        move_chunk_steps: 1000,
        ..SystemConfig::default()
    }
}

fn controller<S: TideSource, T: TelemetrySink>(
    source: S,
    hw: MockActuators,
    sink: T,
    config: &SystemConfig,
    signal: ShutdownSignal,
) -> Controller<S, MockActuators, T> {
    let telemetry = TelemetryEmitter::from_config(sink, config.telemetry.as_ref());
    match Controller::new(source, hw, telemetry, config, signal) {
        Ok(c) => c,
        Err(e) => panic!("controller rejected config: {e}"),
    }
}

/// Serve one canned HTTP response on a loopback port; returns the URL.
fn serve_once(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = stream.write_all(response.as_bytes());
    });
    format!("http://127.0.0.1:{port}/flood-monitoring/id/stations/0003/measures")
}

fn steps_moved(calls: &[ActuatorCall], direction: Direction) -> u32 {
    calls
        .iter()
        .filter_map(|c| match c {
            ActuatorCall::Move { steps, direction: d } if *d == direction => Some(*steps),
            _ => None,
        })
        .sum()
}

// ── Happy path ────────────────────────────────────────────────

#[test]
fn mid_tide_reading_drives_a_full_cycle() {
    let (_trigger, signal) = shutdown::channel();
    let hw = MockActuators::new();
    let calls = hw.log();
    let sink = CaptureSink::new();
    let sent = sink.log();
    let config = test_config();
    let mut ctl = controller(MockTideSource::level(1.625), hw, sink, &config, signal);

    let result = ctl.run_one_cycle();

    assert!(result.success, "cycle failed: {:?}", result.error);
    let calls = calls.lock().unwrap().clone();
    assert_eq!(steps_moved(&calls, Direction::Backward), 3036);
    assert_eq!(steps_moved(&calls, Direction::Forward), 3036);
    assert!(calls.contains(&ActuatorCall::SetRate {
        channel: Channel::Flow,
        rate: 199
    }));
    assert_eq!(calls.last(), Some(&ActuatorCall::Release(Channel::Position)));
    assert_eq!(ctl.state(), ActuatorState::AtHome);
    assert_eq!(ctl.position_offset(), 0);
    assert!(ctl.last_success().is_some());

    assert_eq!(sent.lock().unwrap().as_slice(), &[("/pySend".to_string(), 1.625f32)]);
}

#[test]
fn stepper_is_released_before_the_pump_starts() {
    let (_trigger, signal) = shutdown::channel();
    let hw = MockActuators::new();
    let calls = hw.log();
    let config = test_config();
    let mut ctl = controller(MockTideSource::level(4.21), hw, CaptureSink::new(), &config, signal);

    assert!(ctl.run_one_cycle().success);

    let calls = calls.lock().unwrap().clone();
    let release = calls
        .iter()
        .position(|c| *c == ActuatorCall::Release(Channel::Position))
        .unwrap();
    let pump = calls
        .iter()
        .position(|c| matches!(c, ActuatorCall::SetRate { .. }))
        .unwrap();
    assert!(release < pump);
    assert_eq!(steps_moved(&calls, Direction::Backward), 4715);
}

// ── Fetch failures ────────────────────────────────────────────

#[test]
fn server_error_aborts_before_any_actuation() {
    let (_trigger, signal) = shutdown::channel();
    let hw = MockActuators::new();
    let calls = hw.log();
    let sink = CaptureSink::new();
    let sent = sink.log();
    let config = test_config();
    let url = serve_once("500 Internal Server Error", "");
    let source = HttpTideSource::new(url, Duration::from_secs(5), None);
    let mut ctl = controller(source, hw, sink, &config, signal);

    let result = ctl.run_one_cycle();

    assert!(!result.success);
    assert_eq!(result.error, Some(ErrorKind::Network));
    assert!(calls.lock().unwrap().is_empty(), "no actuator command on fetch failure");
    assert!(sent.lock().unwrap().is_empty(), "no telemetry on fetch failure");
    assert_eq!(ctl.consecutive_actuator_failures(), 0);
}

#[test]
fn empty_items_is_malformed() {
    let (_trigger, signal) = shutdown::channel();
    let hw = MockActuators::new();
    let calls = hw.log();
    let config = test_config();
    let url = serve_once("200 OK", r#"{"items":[]}"#);
    let source = HttpTideSource::new(url, Duration::from_secs(5), None);
    let mut ctl = controller(source, hw, CaptureSink::new(), &config, signal);

    let result = ctl.run_one_cycle();

    assert_eq!(result.error, Some(ErrorKind::MalformedResponse));
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn stale_reading_aborts_before_any_actuation() {
    let (_trigger, signal) = shutdown::channel();
    let hw = MockActuators::new();
    let calls = hw.log();
    let sink = CaptureSink::new();
    let sent = sink.log();
    let config = test_config();
    let url = serve_once(
        "200 OK",
        r#"{"items":[{"latestReading":{"value":1.625,"dateTime":"2018-07-01T12:15:00Z"}}]}"#,
    );
    let source = HttpTideSource::new(url, Duration::from_secs(5), Some(3600));
    let mut ctl = controller(source, hw, sink, &config, signal);

    let result = ctl.run_one_cycle();

    assert_eq!(result.error, Some(ErrorKind::StaleReading));
    assert!(calls.lock().unwrap().is_empty(), "no actuator command on a stale reading");
    assert!(sent.lock().unwrap().is_empty(), "no telemetry on a stale reading");
}

#[test]
fn a_failed_fetch_does_not_stop_the_next_cycle() {
    let (_trigger, signal) = shutdown::channel();
    let hw = MockActuators::new();
    let calls = hw.log();
    let source = MockTideSource::level(0.5).then(Err(FetchError::Network("timed out".into())));
    let config = test_config();
    let mut ctl = controller(source, hw, CaptureSink::new(), &config, signal);

    assert_eq!(ctl.run_one_cycle().error, Some(ErrorKind::Network));
    assert!(calls.lock().unwrap().is_empty());
    assert!(ctl.run_one_cycle().success);
    assert_eq!(ctl.cycle_count(), 2);
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn degenerate_calibration_is_rejected_at_construction() {
    let (_trigger, signal) = shutdown::channel();
    let config = SystemConfig {
        level_calibration: Calibration::new(1.0, 1.0, 0.0, 100.0),
        ..test_config()
    };
    let telemetry = TelemetryEmitter::from_config(CaptureSink::new(), None);
    let err = Controller::new(
        MockTideSource::level(0.0),
        MockActuators::new(),
        telemetry,
        &config,
        signal,
    )
    .err();
    assert_eq!(err, Some(ConfigError::DegenerateCalibration("level")));
}

// ── Actuator faults ───────────────────────────────────────────

#[test]
fn pump_fault_releases_everything_and_counts() {
    let (_trigger, signal) = shutdown::channel();
    let hw = MockActuators::failing();
    let calls = hw.log();
    let config = test_config();
    let mut ctl = controller(MockTideSource::level(1.0), hw, CaptureSink::new(), &config, signal);

    let result = ctl.run_one_cycle();

    assert_eq!(result.error, Some(ErrorKind::ActuatorCommand));
    assert_eq!(ctl.state(), ActuatorState::Deenergized);
    assert_eq!(ctl.consecutive_actuator_failures(), 1);
    let calls = calls.lock().unwrap().clone();
    assert_eq!(
        &calls[calls.len() - 2..],
        &[
            ActuatorCall::Release(Channel::Position),
            ActuatorCall::Release(Channel::Flow)
        ]
    );
}

#[test]
fn halts_once_failures_exceed_the_limit() {
    let (_trigger, signal) = shutdown::channel();
    let config = SystemConfig {
        max_consecutive_actuator_failures: 3,
        ..test_config()
    };
    let mut ctl = controller(
        MockTideSource::level(1.0),
        MockActuators::failing(),
        CaptureSink::new(),
        &config,
        signal,
    );

    for _ in 0..3 {
        assert_eq!(ctl.cycle(), Verdict::Continue);
    }
    assert_eq!(ctl.cycle(), Verdict::Halt);
    assert!(ctl.should_halt());
}

#[test]
fn fetch_failures_never_halt() {
    let (_trigger, signal) = shutdown::channel();
    let config = SystemConfig {
        max_consecutive_actuator_failures: 0,
        ..test_config()
    };
    let source = MockTideSource::level(1.0)
        .then(Err(FetchError::Network("timed out".into())))
        .then(Err(FetchError::Status(503)))
        .then(Err(FetchError::Malformed("`items` is empty".into())));
    let hw = MockActuators::new();
    let calls = hw.log();
    let mut ctl = controller(source, hw, CaptureSink::new(), &config, signal);

    for _ in 0..3 {
        assert_eq!(ctl.cycle(), Verdict::Continue);
    }
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(ctl.consecutive_actuator_failures(), 0);
}

// ── Interrupts ────────────────────────────────────────────────

#[test]
fn interrupt_mid_move_releases_both_channels() {
    let (trigger, signal) = shutdown::channel();
    let hw = MockActuators::interrupting(trigger);
    let calls = hw.log();
    let config = test_config();
    let mut ctl = controller(MockTideSource::level(1.625), hw, CaptureSink::new(), &config, signal);

    let result = ctl.run_one_cycle();

    assert_eq!(result.error, Some(ErrorKind::Interrupted));
    assert_eq!(ctl.state(), ActuatorState::Deenergized);
    assert_eq!(ctl.consecutive_actuator_failures(), 0);
    let calls = calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            ActuatorCall::Move {
                steps: 1000,
                direction: Direction::Backward
            },
            ActuatorCall::Release(Channel::Position),
            ActuatorCall::Release(Channel::Flow),
        ]
    );
}

#[test]
fn dropping_the_controller_releases_every_channel() {
    let (_trigger, signal) = shutdown::channel();
    let hw = MockActuators::new();
    let calls = hw.log();
    let config = test_config();
    let ctl = controller(MockTideSource::level(0.0), hw, CaptureSink::new(), &config, signal);
    drop(ctl);

    let calls = calls.lock().unwrap().clone();
    assert!(!calls.iter().any(is_motion));
    assert!(calls.contains(&ActuatorCall::Release(Channel::Position)));
    assert!(calls.contains(&ActuatorCall::Release(Channel::Flow)));
}
