//! Telemetry snapshot and JSON payload
//!
//! The payload schema is fixed:
//!
//! ```text
//! {"id":"<device id>","params":{"NO2":f,"C2H5OH":f,"VOC":f,"CO":f,"temperature":f},"method":"<method>"}
//! ```
//!
//! Field order is part of the contract and follows declaration order.

use hal_abstractions::GasSensor;
use serde::Serialize;

use crate::error::TelemetryError;

/// Serialization buffer size
pub const PAYLOAD_CAPACITY: usize = 256;

/// One reading of all four gas channels, in volts
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GasReadings {
    pub no2: f32,
    pub c2h5oh: f32,
    pub voc: f32,
    pub co: f32,
}

impl GasReadings {
    /// Read every channel, substituting 0.0 for any channel that fails
    pub fn read<G: GasSensor>(gas: &mut G) -> Self {
        Self {
            no2: channel_or_zero(gas.measure_no2(), "NO2"),
            c2h5oh: channel_or_zero(gas.measure_c2h5oh(), "C2H5OH"),
            voc: channel_or_zero(gas.measure_voc(), "VOC"),
            co: channel_or_zero(gas.measure_co(), "CO"),
        }
    }
}

fn channel_or_zero<E>(reading: Result<f32, E>, channel: &str) -> f32 {
    reading.unwrap_or_else(|_| {
        warn!("Gas channel {} read failed, reporting 0", channel);
        0.0
    })
}

/// `params` object of the payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Params {
    #[serde(rename = "NO2")]
    pub no2: f32,
    #[serde(rename = "C2H5OH")]
    pub c2h5oh: f32,
    #[serde(rename = "VOC")]
    pub voc: f32,
    #[serde(rename = "CO")]
    pub co: f32,
    /// Hottest thermal pixel, °C
    pub temperature: f32,
}

/// The document published every cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryPayload<'a> {
    pub id: &'a str,
    pub params: Params,
    pub method: &'a str,
}

impl<'a> TelemetryPayload<'a> {
    pub fn new(id: &'a str, method: &'a str, gas: GasReadings, temperature: f32) -> Self {
        Self {
            id,
            params: Params {
                no2: gas.no2,
                c2h5oh: gas.c2h5oh,
                voc: gas.voc,
                co: gas.co,
                temperature,
            },
            method,
        }
    }

    /// Write compact JSON into `buf`, returning the number of bytes used
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, TelemetryError> {
        serde_json_core::to_slice(self, buf).map_err(|_| TelemetryError::PayloadOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEVICE_ID, PROPERTY_POST_METHOD};

    struct FixedGas {
        values: [Result<f32, ()>; 4],
    }

    impl GasSensor for FixedGas {
        type Error = ();

        fn init(&mut self) -> Result<(), ()> {
            Ok(())
        }

        fn measure_no2(&mut self) -> Result<f32, ()> {
            self.values[0]
        }

        fn measure_c2h5oh(&mut self) -> Result<f32, ()> {
            self.values[1]
        }

        fn measure_voc(&mut self) -> Result<f32, ()> {
            self.values[2]
        }

        fn measure_co(&mut self) -> Result<f32, ()> {
            self.values[3]
        }
    }

    fn sample_readings() -> GasReadings {
        GasReadings {
            no2: 0.12,
            c2h5oh: 0.05,
            voc: 0.30,
            co: 0.02,
        }
    }

    #[test]
    fn test_payload_matches_schema() {
        let payload = TelemetryPayload::new(DEVICE_ID, PROPERTY_POST_METHOD, sample_readings(), 36.7);
        let mut buf = [0u8; PAYLOAD_CAPACITY];
        let len = payload.serialize(&mut buf).unwrap();
        let json = core::str::from_utf8(&buf[..len]).unwrap();
        assert_eq!(
            json,
            "{\"id\":\"a1BxBIKMsfi.seeed_gasmultisensor\",\
             \"params\":{\"NO2\":0.12,\"C2H5OH\":0.05,\"VOC\":0.3,\"CO\":0.02,\"temperature\":36.7},\
             \"method\":\"thing.event.property.post\"}"
        );
    }

    #[test]
    fn test_payload_fits_fixed_buffer() {
        let readings = GasReadings {
            no2: -1.234_567_8e-12,
            c2h5oh: 3.299_999_9,
            voc: 1.234_567_8e12,
            co: -0.000_123_456_7,
        };
        let payload = TelemetryPayload::new(DEVICE_ID, PROPERTY_POST_METHOD, readings, -273.15);
        let mut buf = [0u8; PAYLOAD_CAPACITY];
        assert!(payload.serialize(&mut buf).is_ok());
    }

    #[test]
    fn test_payload_overflow() {
        let payload = TelemetryPayload::new(DEVICE_ID, PROPERTY_POST_METHOD, sample_readings(), 36.7);
        let mut buf = [0u8; 64];
        assert_eq!(payload.serialize(&mut buf), Err(TelemetryError::PayloadOverflow));
    }

    #[test]
    fn test_read_substitutes_zero_on_failure() {
        let mut gas = FixedGas {
            values: [Ok(0.12), Err(()), Ok(0.30), Err(())],
        };
        let readings = GasReadings::read(&mut gas);
        assert_eq!(
            readings,
            GasReadings {
                no2: 0.12,
                c2h5oh: 0.0,
                voc: 0.30,
                co: 0.0,
            }
        );
    }
}
