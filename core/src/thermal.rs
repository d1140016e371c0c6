//! Hottest-pixel scan

use hal_abstractions::{Frame, PIXEL_COUNT};

// Pixel indices are reported as `u8`
const _: () = assert!(PIXEL_COUNT <= u8::MAX as usize + 1);

/// Where the running maximum of the scan starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanBaseline {
    /// Start at 0.0 °C, index 0.
    ///
    /// A frame that is entirely below zero therefore reports 0.0 °C at
    /// pixel 0 rather than its real maximum.
    #[default]
    Zero,
    /// Start from the first pixel, so negative maxima are reported
    FirstSample,
}

/// The warmest pixel of a frame
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HotPixel {
    pub index: u8,
    pub temperature: f32,
}

/// Linear scan for the maximum temperature and its first index
///
/// Only a strictly greater value replaces the running maximum, so ties keep
/// the earliest pixel and NaN readings are skipped.
pub fn hottest_pixel(frame: &Frame, baseline: ScanBaseline) -> HotPixel {
    let mut hottest = match baseline {
        ScanBaseline::FirstSample if !frame[0].is_nan() => HotPixel {
            index: 0,
            temperature: frame[0],
        },
        _ => HotPixel {
            index: 0,
            temperature: 0.0,
        },
    };

    for (index, &temperature) in frame.iter().enumerate() {
        if temperature > hottest.temperature {
            hottest = HotPixel {
                index: index as u8,
                temperature,
            };
        }
    }
    hottest
}
