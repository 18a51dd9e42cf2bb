//! Motor HAT on a Linux I²C character device (Raspberry Pi).

use anyhow::{Context, Result};
use linux_embedded_hal::{Delay, I2cdev};

use super::motor_hat::MotorHat;
use crate::config::MotorHatConfig;

pub type LinuxMotorHat = MotorHat<I2cdev, Delay>;

/// Open `config.i2c_bus` and initialise the board on it.
pub fn open(config: &MotorHatConfig) -> Result<LinuxMotorHat> {
    let i2c = I2cdev::new(&config.i2c_bus)
        .with_context(|| format!("opening I2C bus {}", config.i2c_bus))?;
    MotorHat::new(i2c, Delay, config)
        .map_err(crate::error::Error::from)
        .with_context(|| format!("initialising Motor HAT at {:#04x}", config.i2c_address))
}
