//! Adapter implementations of the port traits.
//!
//! ```text
//! ┌─────────────────┬──────────────────────────────────────────┐
//! │ tide_http       │ TideSource     ← flood-monitoring JSON   │
//! │ osc             │ TelemetrySink  → OSC over UDP            │
//! │ log_sink        │ TelemetrySink  → log                     │
//! │ sim             │ ActuatorDriver (no hardware)             │
//! │ config_file     │ ConfigPort     ↔ JSON file               │
//! └─────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! The Motor HAT `ActuatorDriver` lives in [`crate::drivers`].

pub mod config_file;
pub mod log_sink;
pub mod osc;
pub mod sim;
pub mod tide_http;
