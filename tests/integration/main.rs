//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host with no Motor HAT
//! and no network access beyond loopback.

mod controller_tests;
mod mock_hw;
mod runner_tests;
