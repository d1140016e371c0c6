//! Grove Multichannel Gas Sensor V2 driver
//!
//! The module carries four MEMS sensors behind a small MCU that speaks a
//! one-byte command protocol:
//!
//! | Command | Meaning |
//! |---|---|
//! | `0x01` | GM-102B (NO2) ADC count |
//! | `0x03` | GM-302B (C2H5OH) ADC count |
//! | `0x05` | GM-502B (VOC) ADC count |
//! | `0x07` | GM-702B (CO) ADC count |
//! | `0x55 <addr>` | change I2C address |
//! | `0xFE` | warm up (pre-heat) |
//! | `0xFF` | warm down |
//!
//! A channel read is a command write followed by a 4-byte little-endian read.

use embedded_hal::i2c::I2c;

use super::{GasSensor, SensorError};

/// Factory I2C address
pub const DEFAULT_ADDRESS: u8 = 0x08;

const CMD_CHANGE_ADDRESS: u8 = 0x55;
const CMD_WARM_UP: u8 = 0xFE;
const CMD_WARM_DOWN: u8 = 0xFF;

/// ADC reference voltage of the on-board MCU
const REFERENCE_VOLTS: f32 = 3.3;
/// Full-scale ADC count (10-bit)
const ADC_FULL_SCALE: f32 = 1023.0;

/// One of the four sensing elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GasChannel {
    /// GM-102B, nitrogen dioxide
    No2,
    /// GM-302B, ethanol
    C2h5oh,
    /// GM-502B, volatile organic compounds
    Voc,
    /// GM-702B, carbon monoxide
    Co,
}

impl GasChannel {
    fn command(self) -> u8 {
        match self {
            Self::No2 => 0x01,
            Self::C2h5oh => 0x03,
            Self::Voc => 0x05,
            Self::Co => 0x07,
        }
    }
}

/// Convert a raw ADC count to volts
pub fn adc_to_volts(adc: u32) -> f32 {
    adc as f32 * REFERENCE_VOLTS / ADC_FULL_SCALE
}

/// Grove Multichannel Gas V2 on an I2C bus
pub struct MultichannelGas<I2C> {
    i2c: I2C,
    address: u8,
    preheated: bool,
}

impl<I2C: I2c> MultichannelGas<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            preheated: false,
        }
    }

    /// Give the bus back
    pub fn release(self) -> I2C {
        self.i2c
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn is_preheated(&self) -> bool {
        self.preheated
    }

    /// Switch the heaters on
    pub fn preheat(&mut self) -> Result<(), SensorError<I2C::Error>> {
        self.i2c.write(self.address, &[CMD_WARM_UP])?;
        self.preheated = true;
        Ok(())
    }

    /// Switch the heaters off; the next read pre-heats again
    pub fn warm_down(&mut self) -> Result<(), SensorError<I2C::Error>> {
        self.i2c.write(self.address, &[CMD_WARM_DOWN])?;
        self.preheated = false;
        Ok(())
    }

    /// Reprogram the module's I2C address and keep talking to it there
    pub fn change_address(&mut self, new_address: u8) -> Result<(), SensorError<I2C::Error>> {
        if new_address == 0 || new_address > 0x7F {
            return Err(SensorError::InvalidAddress(new_address));
        }
        self.i2c
            .write(self.address, &[CMD_CHANGE_ADDRESS, new_address])?;
        self.address = new_address;
        Ok(())
    }

    /// Raw ADC count for one channel
    pub fn read_raw(&mut self, channel: GasChannel) -> Result<u32, SensorError<I2C::Error>> {
        if !self.preheated {
            self.preheat()?;
        }
        let mut buf = [0u8; 4];
        self.i2c.write(self.address, &[channel.command()])?;
        self.i2c.read(self.address, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Channel output in volts
    pub fn read_volts(&mut self, channel: GasChannel) -> Result<f32, SensorError<I2C::Error>> {
        self.read_raw(channel).map(adc_to_volts)
    }
}

impl<I2C: I2c> GasSensor for MultichannelGas<I2C> {
    type Error = SensorError<I2C::Error>;

    fn init(&mut self) -> Result<(), Self::Error> {
        self.preheat()
    }

    fn measure_no2(&mut self) -> Result<f32, Self::Error> {
        self.read_volts(GasChannel::No2)
    }

    fn measure_c2h5oh(&mut self) -> Result<f32, Self::Error> {
        self.read_volts(GasChannel::C2h5oh)
    }

    fn measure_voc(&mut self) -> Result<f32, Self::Error> {
        self.read_volts(GasChannel::Voc)
    }

    fn measure_co(&mut self) -> Result<f32, Self::Error> {
        self.read_volts(GasChannel::Co)
    }
}
