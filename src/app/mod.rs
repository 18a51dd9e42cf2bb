//! Application core: the tide cycle and the routines around it.
//!
//! The business rules live here: reading → level → plan, the cycle's
//! failure policy, the long-running loop, and the bench routines.  All
//! interaction with the network and the motor controller happens through
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod controller;
pub mod maintenance;
pub mod model;
pub mod ports;
pub mod runner;
pub mod telemetry;
