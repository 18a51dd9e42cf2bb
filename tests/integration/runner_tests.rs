//! Long-running mode: scheduler + controller + shutdown together.

use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

use tidemotor::adapters::tide_http::HttpTideSource;
use tidemotor::app::controller::Controller;
use tidemotor::app::ports::Channel;
use tidemotor::app::runner::{RunOutcome, run_until_shutdown};
use tidemotor::app::telemetry::TelemetryEmitter;
use tidemotor::config::SystemConfig;
use tidemotor::shutdown::{self, ShutdownSignal};

use crate::mock_hw::{ActuatorCall, CaptureSink, MockActuators, MockTideSource, is_motion};

fn config() -> SystemConfig {
    SystemConfig {
        hold_duration_secs: 0.0,
        ramp_steps: 0,
        move_chunk_steps: 500,
        interval_secs: 3600,
        run_immediately: true,
        shutdown_grace_secs: 5,
        ..SystemConfig::default()
    }
}

fn build(
    hw: MockActuators,
    config: &SystemConfig,
    signal: ShutdownSignal,
) -> Controller<MockTideSource, MockActuators, CaptureSink> {
    let telemetry = TelemetryEmitter::from_config(CaptureSink::new(), config.telemetry.as_ref());
    match Controller::new(MockTideSource::level(2.0), hw, telemetry, config, signal) {
        Ok(c) => c,
        Err(e) => panic!("controller rejected config: {e}"),
    }
}

#[test]
fn interrupt_during_a_move_stops_cleanly() {
    let (trigger, signal) = shutdown::channel();
    let hw = MockActuators::interrupting(trigger);
    let calls = hw.log();
    let config = config();
    let ctl = build(hw, &config, signal.clone());

    let start = Instant::now();
    let outcome = run_until_shutdown(ctl, &config, &signal);

    assert_eq!(outcome, RunOutcome::Interrupted);
    assert_eq!(outcome.exit_code(), 0);
    assert!(start.elapsed() < Duration::from_secs(5), "shutdown did not wait out the interval");

    let calls = calls.lock().unwrap().clone();
    assert!(matches!(calls[0], ActuatorCall::Move { steps: 500, .. }));
    let first_release = calls
        .iter()
        .position(|c| !is_motion(c))
        .unwrap();
    assert!(
        calls[first_release..].iter().all(|c| !is_motion(c)),
        "motion after release: {calls:?}"
    );
    assert!(calls.contains(&ActuatorCall::Release(Channel::Position)));
    assert!(calls.contains(&ActuatorCall::Release(Channel::Flow)));
}

#[test]
fn repeated_actuator_faults_halt_with_failure_status() {
    let (_trigger, signal) = shutdown::channel();
    let config = SystemConfig {
        interval_secs: 1,
        max_consecutive_actuator_failures: 0,
        ..config()
    };
    let hw = MockActuators::failing();
    let calls = hw.log();
    let ctl = build(hw, &config, signal.clone());

    let outcome = run_until_shutdown(ctl, &config, &signal);

    assert_eq!(outcome, RunOutcome::Halted);
    assert_eq!(outcome.exit_code(), 1);
    let calls = calls.lock().unwrap().clone();
    assert_eq!(calls.last(), Some(&ActuatorCall::Release(Channel::Flow)));
}

#[test]
fn interrupt_abandons_an_unanswered_fetch() {
    // Accepts connections through the backlog and never responds.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let (trigger, signal) = shutdown::channel();
    let config = SystemConfig {
        tide_url: format!("http://{}/measures", listener.local_addr().unwrap()),
        interval_secs: 3600,
        run_immediately: true,
        ..SystemConfig::default()
    };
    assert!(config.shutdown_grace() > config.fetch_timeout());

    let source = HttpTideSource::new(config.tide_url.clone(), config.fetch_timeout(), None)
        .with_shutdown(signal.clone());
    let hw = MockActuators::new();
    let calls = hw.log();
    let telemetry = TelemetryEmitter::from_config(CaptureSink::new(), config.telemetry.as_ref());
    let ctl = match Controller::new(source, hw, telemetry, &config, signal.clone()) {
        Ok(c) => c,
        Err(e) => panic!("controller rejected config: {e}"),
    };

    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        trigger.trigger();
    });
    let start = Instant::now();
    let outcome = run_until_shutdown(ctl, &config, &signal);
    let elapsed = start.elapsed();
    stopper.join().unwrap();

    assert_eq!(outcome, RunOutcome::Interrupted);
    assert!(elapsed < Duration::from_secs(5), "shutdown waited for the fetch: {elapsed:?}");
    let calls = calls.lock().unwrap().clone();
    assert!(!calls.iter().any(is_motion), "actuated without a reading: {calls:?}");
    drop(listener);
}
