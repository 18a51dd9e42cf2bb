//! Tidemotor — Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HttpTideSource    OscUdpSink / LogTelemetrySink               │
//! │  (TideSource)      (TelemetrySink)                             │
//! │  MotorHat / SimulatedActuators        JsonConfigFile           │
//! │  (ActuatorDriver)                     (ConfigPort)             │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              Controller (pure logic)                   │    │
//! │  │  Mapper · Sequencer · ShutdownGuard                    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  CycleScheduler (skip-on-overlap) · ShutdownSignal (ctrlc)     │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info, warn};

use tidemotor::adapters::config_file::JsonConfigFile;
use tidemotor::adapters::log_sink::LogTelemetrySink;
use tidemotor::adapters::osc::OscUdpSink;
use tidemotor::adapters::sim::SimulatedActuators;
use tidemotor::adapters::tide_http::HttpTideSource;
use tidemotor::app::controller::Controller;
use tidemotor::app::maintenance::{self, TravelTest};
use tidemotor::app::ports::{ActuatorDriver, ConfigPort, TelemetrySink};
use tidemotor::app::runner::run_until_shutdown;
use tidemotor::app::telemetry::TelemetryEmitter;
use tidemotor::config::SystemConfig;
use tidemotor::error::ErrorKind;
use tidemotor::safety::ShutdownGuard;
use tidemotor::shutdown::{self, ShutdownSignal};

type Actuators = Box<dyn ActuatorDriver + Send>;
type Telemetry = Box<dyn TelemetrySink + Send>;

#[derive(Parser)]
#[command(name = "tidemotor", version)]
#[command(about = "Moves a plate and runs a pump in step with the tide")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// JSON config file (defaults are used when omitted)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Actuator backend
    #[arg(long, value_enum, default_value = "sim", global = true)]
    hardware: Hardware,
}

#[derive(Subcommand)]
enum Command {
    /// Run a cycle every interval until interrupted (default).
    Run,
    /// Run a single cycle and exit.
    Once,
    /// Run the pump to fill the tubing.
    Prime {
        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        secs: Option<f64>,
    },
    /// Pulse the pump on and off at the configured test rate.
    FlowTest {
        /// Number of pulses (default: until interrupted)
        #[arg(long)]
        repeats: Option<u32>,
    },
    /// Drive the plate the full travel out and back.
    TravelTest {
        /// Number of round trips (default: until interrupted)
        #[arg(long)]
        repeats: Option<u32>,
        /// Override the configured travel in steps
        #[arg(long)]
        steps: Option<u32>,
    },
    /// Print the effective config as JSON.
    PrintConfig,
    /// Write the default config to the `--config` path.
    InitConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Hardware {
    /// In-memory actuators; logs every command
    Sim,
    /// Adafruit Motor HAT over Linux I2C
    MotorHat,
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<u8> {
    let command = cli.command.unwrap_or(Command::Run);

    if let Command::InitConfig = command {
        let path = cli.config.context("init-config needs --config <path>")?;
        JsonConfigFile::new(&path).save(&SystemConfig::default())?;
        info!("Wrote default config to {}", path.display());
        return Ok(0);
    }

    let config = load_config(cli.config.as_ref())?;
    if let Command::PrintConfig = command {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(0);
    }

    info!("Tidemotor v{}", env!("CARGO_PKG_VERSION"));

    // ── Shutdown wiring ───────────────────────────────────────
    let (trigger, signal) = shutdown::channel();
    ctrlc::set_handler(move || trigger.trigger()).context("installing signal handler")?;

    // ── Actuators ─────────────────────────────────────────────
    let actuators = open_actuators(cli.hardware, &config)?;

    match command {
        Command::Run => {
            let controller = build_controller(actuators, &config, signal.clone())?;
            let outcome = run_until_shutdown(controller, &config, &signal);
            Ok(outcome.exit_code())
        }
        Command::Once => {
            let mut controller = build_controller(actuators, &config, signal)?;
            let result = controller.run_one_cycle();
            controller.shutdown();
            Ok(match result.error {
                None | Some(ErrorKind::Interrupted) => 0,
                Some(_) => 1,
            })
        }
        Command::Prime { secs } => {
            let duration = secs
                .filter(|s| s.is_finite() && *s > 0.0)
                .map(Duration::from_secs_f64);
            let mut hw = ShutdownGuard::new(actuators);
            maintenance::prime(&mut *hw, config.prime_rate, duration, &signal)?;
            Ok(0)
        }
        Command::FlowTest { repeats } => {
            let mut hw = ShutdownGuard::new(actuators);
            maintenance::flow_test(
                &mut *hw,
                config.flow_test_rate,
                Duration::from_secs(config.flow_test_run_secs),
                Duration::from_secs(config.flow_test_pause_secs),
                repeats,
                &signal,
            )?;
            Ok(0)
        }
        Command::TravelTest { repeats, steps } => {
            let mut test = TravelTest::from_config(&config);
            if let Some(steps) = steps {
                test.steps = steps;
            }
            let mut hw = ShutdownGuard::new(actuators);
            maintenance::travel_test(&mut *hw, &test, repeats, &signal)?;
            Ok(0)
        }
        Command::PrintConfig | Command::InitConfig => Ok(0),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<SystemConfig> {
    let config = match path {
        Some(path) => JsonConfigFile::new(path).load()?,
        None => {
            info!("No --config given, using defaults");
            let config = SystemConfig::default();
            config.validate()?;
            config
        }
    };
    Ok(config)
}

fn build_controller(
    actuators: Actuators,
    config: &SystemConfig,
    signal: ShutdownSignal,
) -> Result<Controller<HttpTideSource, Actuators, Telemetry>> {
    let source = HttpTideSource::new(
        config.tide_url.clone(),
        config.fetch_timeout(),
        config.max_reading_age_secs,
    )
    .with_shutdown(signal.clone());
    let sink: Telemetry = match &config.telemetry {
        Some(t) => match OscUdpSink::new(&t.host, t.port) {
            Ok(sink) => Box::new(sink),
            Err(e) => {
                warn!("OSC telemetry unavailable ({e}), logging values instead");
                Box::new(LogTelemetrySink::new())
            }
        },
        None => Box::new(LogTelemetrySink::new()),
    };
    let telemetry = TelemetryEmitter::from_config(sink, config.telemetry.as_ref());
    let controller = Controller::new(source, actuators, telemetry, config, signal)?;
    Ok(controller)
}

fn open_actuators(hardware: Hardware, config: &SystemConfig) -> Result<Actuators> {
    match hardware {
        Hardware::Sim => {
            info!("Using simulated actuators");
            Ok(Box::new(SimulatedActuators::new()))
        }
        Hardware::MotorHat => open_motor_hat(config),
    }
}

#[cfg(feature = "motor-hat")]
fn open_motor_hat(config: &SystemConfig) -> Result<Actuators> {
    let hat = tidemotor::drivers::linux::open(&config.motor_hat)?;
    Ok(Box::new(hat))
}

#[cfg(not(feature = "motor-hat"))]
fn open_motor_hat(_config: &SystemConfig) -> Result<Actuators> {
    anyhow::bail!("built without the `motor-hat` feature; rebuild with --features motor-hat")
}
