//! Sensor traits and I2C drivers
//!
//! The node reads two devices over one I2C bus:
//! - **`gas`**: Grove Multichannel Gas V2 (GM-102B/302B/502B/702B)
//! - **`thermal`**: Panasonic AMG8833 8x8 Grid-EYE thermal array
//!
//! Both drivers are generic over `embedded_hal::i2c::I2c`, so a board only
//! has to hand over its bus (or a shared-bus device).

pub mod gas;
pub mod thermal;

/// Number of pixels in the thermal array (8x8)
pub const PIXEL_COUNT: usize = 64;

/// One thermal frame, pixel temperatures in °C, row-major
pub type Frame = [f32; PIXEL_COUNT];

/// Sensor driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError<E> {
    /// Underlying I2C transfer failed
    Bus(E),
    /// Pixel index outside `0..PIXEL_COUNT`
    InvalidPixel(u8),
    /// Not a usable 7-bit I2C address
    InvalidAddress(u8),
}

impl<E> From<E> for SensorError<E>
where
    E: embedded_hal::i2c::Error,
{
    fn from(err: E) -> Self {
        Self::Bus(err)
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for SensorError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "I2C bus error: {:?}", e),
            Self::InvalidPixel(i) => write!(f, "Invalid pixel index {}", i),
            Self::InvalidAddress(a) => write!(f, "Invalid I2C address 0x{:02X}", a),
        }
    }
}

impl<E: core::fmt::Debug> core::error::Error for SensorError<E> {}

/// Multi-channel gas sensor
///
/// Each measurement is the sensor channel's output voltage
/// (`adc * 3.3 / 1023`). No calibration to ppm is attempted.
///
/// The vendor's Arduino library returns the raw ADC count from its
/// `measure_*` calls, so published values differ from nodes running that
/// firmware by the `3.3 / 1023` factor. Use
/// [`gas::MultichannelGas::read_raw`] when raw counts are needed.
pub trait GasSensor {
    type Error;

    /// Bring the sensor into a measuring state (pre-heat)
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Nitrogen dioxide channel
    fn measure_no2(&mut self) -> Result<f32, Self::Error>;

    /// Ethanol channel
    fn measure_c2h5oh(&mut self) -> Result<f32, Self::Error>;

    /// Volatile organic compounds channel
    fn measure_voc(&mut self) -> Result<f32, Self::Error>;

    /// Carbon monoxide channel
    fn measure_co(&mut self) -> Result<f32, Self::Error>;
}

/// Thermal imaging array with `PIXEL_COUNT` pixels
pub trait ThermalArray {
    type Error;

    /// Configure the array for continuous measurement
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Temperature of a single pixel in °C
    fn pixel_temperature(&mut self, index: u8) -> Result<f32, Self::Error>;

    /// Read every pixel
    ///
    /// The default implementation issues one transfer per pixel; drivers that
    /// support burst reads should override it.
    fn read_frame(&mut self) -> Result<Frame, Self::Error> {
        let mut frame = [0.0; PIXEL_COUNT];
        for (index, pixel) in frame.iter_mut().enumerate() {
            *pixel = self.pixel_temperature(index as u8)?;
        }
        Ok(frame)
    }
}
