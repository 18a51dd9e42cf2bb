//! Unified error types for the tide controller.
//!
//! Every subsystem owns a small error enum; all of them convert into the
//! crate-wide [`Error`] so the cycle path can propagate with `?`, and the
//! scheduler loop classifies failures through [`ErrorKind`] without
//! matching on payloads.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The tide reading could not be fetched or validated.
    Fetch(FetchError),
    /// A calibration could not be applied.
    Map(MapError),
    /// An actuator command failed.
    Actuator(ActuatorError),
    /// A telemetry message could not be sent.
    Telemetry(TelemetryError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Shutdown was requested while work was in progress.
    Interrupted,
}

/// Coarse classification used for logging and halt decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    MalformedResponse,
    StaleReading,
    DivisionDegenerate,
    ActuatorCommand,
    Telemetry,
    Config,
    Interrupted,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch(FetchError::Network(_) | FetchError::Status(_)) => ErrorKind::Network,
            Self::Fetch(FetchError::Malformed(_)) => ErrorKind::MalformedResponse,
            Self::Fetch(FetchError::Stale { .. }) => ErrorKind::StaleReading,
            Self::Fetch(FetchError::Interrupted) => ErrorKind::Interrupted,
            Self::Map(MapError::DivisionDegenerate)
            | Self::Config(ConfigError::DegenerateCalibration(_)) => ErrorKind::DivisionDegenerate,
            Self::Actuator(_) => ErrorKind::ActuatorCommand,
            Self::Telemetry(_) => ErrorKind::Telemetry,
            Self::Config(_) => ErrorKind::Config,
            Self::Interrupted => ErrorKind::Interrupted,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(e) => write!(f, "fetch: {e}"),
            Self::Map(e) => write!(f, "map: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Telemetry(e) => write!(f, "telemetry: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

impl std::error::Error for Error {}
impl std::error::Error for FetchError {}
impl std::error::Error for MapError {}
impl std::error::Error for ActuatorError {}
impl std::error::Error for TelemetryError {}
impl std::error::Error for ConfigError {}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "NetworkError",
            Self::MalformedResponse => "MalformedResponse",
            Self::StaleReading => "StaleReading",
            Self::DivisionDegenerate => "DivisionDegenerate",
            Self::ActuatorCommand => "ActuatorCommandError",
            Self::Telemetry => "TelemetryError",
            Self::Config => "ConfigError",
            Self::Interrupted => "Interrupted",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Fetch errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Timeout, connection refused, DNS failure, truncated body.
    Network(String),
    /// The endpoint answered with a non-2xx status.
    Status(u16),
    /// The body did not have the expected shape.
    Malformed(String),
    /// The reading is older than the configured bound.
    Stale { age_secs: i64, max_age_secs: u64 },
    /// Shutdown was requested before the response arrived.
    Interrupted,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Status(code) => write!(f, "HTTP status {code}"),
            Self::Malformed(msg) => write!(f, "malformed response: {msg}"),
            Self::Stale {
                age_secs,
                max_age_secs,
            } => write!(f, "stale reading: {age_secs}s old (limit {max_age_secs}s)"),
            Self::Interrupted => write!(f, "abandoned on shutdown"),
        }
    }
}

impl From<FetchError> for Error {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Interrupted => Self::Interrupted,
            e => Self::Fetch(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Mapping errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// `in_min == in_max`: the input range has zero width.
    DivisionDegenerate,
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DivisionDegenerate => write!(f, "degenerate input range (in_min == in_max)"),
        }
    }
}

impl From<MapError> for Error {
    fn from(e: MapError) -> Self {
        Self::Map(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// A register write on the controller bus failed.
    BusWriteFailed,
    /// The motor controller did not answer at startup.
    NotDetected,
    /// The channel does not support the requested command.
    UnsupportedCommand,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusWriteFailed => write!(f, "bus write failed"),
            Self::NotDetected => write!(f, "motor controller not detected"),
            Self::UnsupportedCommand => write!(f, "command not supported on this channel"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Telemetry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    /// Socket setup or send failed.
    Io(String),
    /// The message could not be encoded (bad address, packet too large).
    Encode(&'static str),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Encode(msg) => write!(f, "encode error: {msg}"),
        }
    }
}

impl From<TelemetryError> for Error {
    fn from(e: TelemetryError) -> Self {
        Self::Telemetry(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The config file does not exist.
    NotFound(String),
    /// The config file could not be read or written.
    Io(String),
    /// The config file is not valid JSON for [`SystemConfig`](crate::config::SystemConfig).
    Parse(String),
    /// A calibration has `in_min == in_max`. Carries the calibration name.
    DegenerateCalibration(&'static str),
    /// A field failed range validation.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "config not found: {path}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::DegenerateCalibration(name) => {
                write!(f, "{name} calibration has in_min == in_max")
            }
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
