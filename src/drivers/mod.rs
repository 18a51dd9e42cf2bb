//! Motor controller drivers.
//!
//! The PCA9685 and Motor HAT drivers are generic over the `embedded-hal`
//! I²C and delay traits and run on the host against a mock bus.  The Linux
//! binding is only built with the `motor-hat` feature.

pub mod motor_hat;
pub mod pca9685;

#[cfg(feature = "motor-hat")]
pub mod linux;
