//! Panasonic AMG8833 (Grid-EYE) 8x8 thermal array driver
//!
//! Pixel registers start at `0x80`, two bytes per pixel, little-endian.
//! Each value is 12-bit two's complement at 0.25 °C per LSB. The on-chip
//! thermistor (`0x0E`) is 12-bit sign-magnitude at 0.0625 °C per LSB.

use embedded_hal::i2c::I2c;

use super::{Frame, SensorError, ThermalArray, PIXEL_COUNT};

/// Address with the AD_SELECT pin high (breakout default)
pub const DEFAULT_ADDRESS: u8 = 0x69;
/// Address with the AD_SELECT pin low
pub const ALTERNATE_ADDRESS: u8 = 0x68;

const REG_PCTL: u8 = 0x00;
const REG_RST: u8 = 0x01;
const REG_FPSC: u8 = 0x02;
const REG_TTHL: u8 = 0x0E;
const REG_PIXEL_BASE: u8 = 0x80;

const PCTL_NORMAL: u8 = 0x00;
const RST_INITIAL: u8 = 0x3F;
const FPSC_10FPS: u8 = 0x00;

const PIXEL_CELSIUS_PER_LSB: f32 = 0.25;
const THERMISTOR_CELSIUS_PER_LSB: f32 = 0.0625;

/// Decode a pixel register pair into °C
fn decode_pixel(lo: u8, hi: u8) -> f32 {
    let raw = u16::from_le_bytes([lo, hi]) & 0x0FFF;
    // sign-extend bit 11
    let value = ((raw << 4) as i16) >> 4;
    value as f32 * PIXEL_CELSIUS_PER_LSB
}

/// Decode the thermistor register pair into °C
fn decode_thermistor(lo: u8, hi: u8) -> f32 {
    let raw = u16::from_le_bytes([lo, hi]);
    let magnitude = (raw & 0x07FF) as f32 * THERMISTOR_CELSIUS_PER_LSB;
    if raw & 0x0800 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// AMG8833 on an I2C bus
pub struct GridEye<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> GridEye<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Normal power mode, initial reset, 10 frames per second
    pub fn configure(&mut self) -> Result<(), SensorError<I2C::Error>> {
        self.i2c.write(self.address, &[REG_PCTL, PCTL_NORMAL])?;
        self.i2c.write(self.address, &[REG_RST, RST_INITIAL])?;
        self.i2c.write(self.address, &[REG_FPSC, FPSC_10FPS])?;
        Ok(())
    }

    /// On-chip thermistor temperature in °C
    pub fn thermistor_temperature(&mut self) -> Result<f32, SensorError<I2C::Error>> {
        let mut buf = [0u8; 2];
        self.i2c.write_read(self.address, &[REG_TTHL], &mut buf)?;
        Ok(decode_thermistor(buf[0], buf[1]))
    }
}

impl<I2C: I2c> ThermalArray for GridEye<I2C> {
    type Error = SensorError<I2C::Error>;

    fn init(&mut self) -> Result<(), Self::Error> {
        self.configure()
    }

    fn pixel_temperature(&mut self, index: u8) -> Result<f32, Self::Error> {
        if index as usize >= PIXEL_COUNT {
            return Err(SensorError::InvalidPixel(index));
        }
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[REG_PIXEL_BASE + index * 2], &mut buf)?;
        Ok(decode_pixel(buf[0], buf[1]))
    }

    /// One 128-byte burst read of the whole pixel block
    fn read_frame(&mut self) -> Result<Frame, Self::Error> {
        let mut raw = [0u8; PIXEL_COUNT * 2];
        self.i2c
            .write_read(self.address, &[REG_PIXEL_BASE], &mut raw)?;

        let mut frame = [0.0; PIXEL_COUNT];
        for (pixel, bytes) in frame.iter_mut().zip(raw.chunks_exact(2)) {
            *pixel = decode_pixel(bytes[0], bytes[1]);
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::fake::FakeBus;

    #[test]
    fn test_decode_pixel() {
        assert_eq!(decode_pixel(0x00, 0x00), 0.0);
        // 0x064 = 100 LSB = 25 °C
        assert_eq!(decode_pixel(0x64, 0x00), 25.0);
        // 0xFFF = -1 LSB
        assert_eq!(decode_pixel(0xFF, 0x0F), -0.25);
        // 0xF9C = -100 LSB
        assert_eq!(decode_pixel(0x9C, 0x0F), -25.0);
        // upper nibble is not part of the value
        assert_eq!(decode_pixel(0x64, 0xF0), 25.0);
    }

    #[test]
    fn test_decode_thermistor() {
        // 0x190 = 400 LSB = 25 °C
        assert_eq!(decode_thermistor(0x90, 0x01), 25.0);
        assert_eq!(decode_thermistor(0x10, 0x08), -1.0);
    }

    #[test]
    fn test_configure_sequence() {
        let mut eye = GridEye::new(FakeBus::new(), DEFAULT_ADDRESS);
        eye.init().unwrap();
        let bus = eye.release();
        assert_eq!(bus.written(0), (DEFAULT_ADDRESS, &[REG_PCTL, PCTL_NORMAL][..]));
        assert_eq!(bus.written(1), (DEFAULT_ADDRESS, &[REG_RST, RST_INITIAL][..]));
        assert_eq!(bus.written(2), (DEFAULT_ADDRESS, &[REG_FPSC, FPSC_10FPS][..]));
    }

    #[test]
    fn test_pixel_register_address() {
        let mut eye = GridEye::new(FakeBus::with_reads(&[0x50, 0x00]), DEFAULT_ADDRESS);
        assert_eq!(eye.pixel_temperature(63).unwrap(), 20.0);
        let bus = eye.release();
        assert_eq!(bus.written(0), (DEFAULT_ADDRESS, &[0xFE][..]));
    }

    #[test]
    fn test_pixel_index_out_of_range() {
        let mut eye = GridEye::new(FakeBus::new(), DEFAULT_ADDRESS);
        assert_eq!(
            eye.pixel_temperature(64),
            Err(SensorError::InvalidPixel(64))
        );
    }

    #[test]
    fn test_read_frame_burst() {
        let mut raw = [0u8; PIXEL_COUNT * 2];
        for i in 0..PIXEL_COUNT {
            raw[i * 2] = i as u8;
        }
        // pixel 10 at -10 °C (0xFD8)
        raw[20] = 0xD8;
        raw[21] = 0x0F;
        let mut eye = GridEye::new(FakeBus::with_reads(&raw), ALTERNATE_ADDRESS);

        let frame = eye.read_frame().unwrap();
        assert_eq!(frame[0], 0.0);
        assert_eq!(frame[1], 0.25);
        assert_eq!(frame[10], -10.0);
        assert_eq!(frame[63], 63.0 * 0.25);

        let bus = eye.release();
        assert_eq!(bus.writes.len(), 1);
        assert_eq!(bus.written(0), (ALTERNATE_ADDRESS, &[REG_PIXEL_BASE][..]));
    }
}
