//! Tidemotor controller library.
//!
//! Exposes the domain core, adapters, and drivers for the binary and for
//! integration testing.  Only the Linux I²C binding needs real hardware;
//! it is behind the `motor-hat` feature.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod mapper;
pub mod safety;
pub mod scheduler;
pub mod shutdown;

pub mod adapters;
pub mod drivers;
