//! PCA9685 16-channel 12-bit PWM controller over I²C.
//!
//! The Motor HAT routes every H-bridge input (speed PWM and the two
//! direction pins of each bridge) through one PCA9685.  A channel driven
//! with `on = 4096` is fully high; `off = 4096` is fully low.
//!
//! ## Register map (subset)
//!
//! | Reg  | Name       | Use                                   |
//! |------|------------|---------------------------------------|
//! | 0x00 | MODE1      | sleep / restart / all-call            |
//! | 0x01 | MODE2      | totem-pole outputs                    |
//! | 0x06 | LED0_ON_L  | first channel; 4 registers/channel    |
//! | 0xFA | ALL_LED_ON_L | broadcast to every channel          |
//! | 0xFE | PRE_SCALE  | PWM frequency, only writable asleep   |

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::error::ActuatorError;

pub const MODE1: u8 = 0x00;
pub const MODE2: u8 = 0x01;
pub const LED0_ON_L: u8 = 0x06;
pub const ALL_LED_ON_L: u8 = 0xFA;
pub const PRE_SCALE: u8 = 0xFE;

const MODE1_RESTART: u8 = 0x80;
const MODE1_SLEEP: u8 = 0x10;
const MODE1_ALLCALL: u8 = 0x01;
const MODE2_OUTDRV: u8 = 0x04;

/// Internal oscillator frequency.
const OSC_HZ: f64 = 25_000_000.0;
/// Counter value that forces a channel fully on or off.
pub const FULL: u16 = 4096;
pub const CHANNELS: u8 = 16;

/// Oscillator settle time after leaving sleep.
const WAKE_DELAY_US: u32 = 5_000;

/// Prescale register value for `freq_hz`, rounded to nearest.
pub fn prescale_for(freq_hz: u16) -> u8 {
    let raw = OSC_HZ / 4096.0 / f64::from(freq_hz.max(1)) - 1.0;
    (raw + 0.5).floor().clamp(3.0, 255.0) as u8
}

pub struct Pca9685<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Pca9685<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Put every channel low, wake the oscillator, and set the PWM frequency.
    ///
    /// Fails with [`ActuatorError::NotDetected`] if the chip does not answer.
    pub fn init(&mut self, freq_hz: u16, delay: &mut impl DelayNs) -> Result<(), ActuatorError> {
        self.read_reg(MODE1)?;
        self.set_all_pwm(0, 0)?;
        self.write_reg(MODE2, MODE2_OUTDRV)?;
        self.write_reg(MODE1, MODE1_ALLCALL)?;
        delay.delay_us(WAKE_DELAY_US);

        let mode1 = self.read_reg(MODE1)? & !MODE1_SLEEP;
        self.write_reg(MODE1, mode1)?;
        delay.delay_us(WAKE_DELAY_US);

        self.set_frequency(freq_hz, delay)
    }

    /// The prescaler only latches while the oscillator is asleep.
    pub fn set_frequency(&mut self, freq_hz: u16, delay: &mut impl DelayNs) -> Result<(), ActuatorError> {
        let prescale = prescale_for(freq_hz);
        let old = self.read_reg(MODE1)?;
        self.write_reg(MODE1, (old & !MODE1_RESTART) | MODE1_SLEEP)?;
        self.write_reg(PRE_SCALE, prescale)?;
        self.write_reg(MODE1, old)?;
        delay.delay_us(WAKE_DELAY_US);
        self.write_reg(MODE1, old | MODE1_RESTART)?;
        log::info!("PCA9685 @ {:#04x}: {freq_hz} Hz (prescale {prescale})", self.address);
        Ok(())
    }

    pub fn set_pwm(&mut self, channel: u8, on: u16, off: u16) -> Result<(), ActuatorError> {
        if channel >= CHANNELS {
            return Err(ActuatorError::UnsupportedCommand);
        }
        self.write_counts(LED0_ON_L + 4 * channel, on, off)
    }

    pub fn set_all_pwm(&mut self, on: u16, off: u16) -> Result<(), ActuatorError> {
        self.write_counts(ALL_LED_ON_L, on, off)
    }

    /// Drive `channel` as a digital output.
    pub fn set_pin(&mut self, channel: u8, high: bool) -> Result<(), ActuatorError> {
        if high {
            self.set_pwm(channel, FULL, 0)
        } else {
            self.set_pwm(channel, 0, FULL)
        }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn write_counts(&mut self, base: u8, on: u16, off: u16) -> Result<(), ActuatorError> {
        let [on_l, on_h] = on.to_le_bytes();
        let [off_l, off_h] = off.to_le_bytes();
        // Auto-increment is off; one register per write.
        self.write_reg(base, on_l)?;
        self.write_reg(base + 1, on_h)?;
        self.write_reg(base + 2, off_l)?;
        self.write_reg(base + 3, off_h)
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), ActuatorError> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(|_| ActuatorError::BusWriteFailed)
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, ActuatorError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(|_| ActuatorError::NotDetected)?;
        Ok(buf[0])
    }
}
