//! Platform-agnostic core logic for IoT firmware
//!
//! This crate contains the telemetry node's business logic. It has NO
//! hardware dependencies: drivers arrive through the `hal-abstractions`
//! traits and time arrives as a millisecond tick passed to each step.
//!
//! - **`config`**: static credentials, topics and timing
//! - **`thermal`**: hottest-pixel scan over a thermal frame
//! - **`telemetry`**: gas snapshot and the JSON payload
//! - **`retry`** / **`link`**: fixed-delay retry schedule and link state
//! - **`node`**: the device context and its non-blocking scheduler step

#![no_std]
#![deny(unsafe_code)]
#![deny(warnings)]

#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod link;
pub mod node;
pub mod retry;
pub mod telemetry;
pub mod thermal;

pub use config::{BrokerConfig, NodeConfig, WifiConfig};
pub use error::TelemetryError;
pub use link::LinkState;
pub use node::{Drivers, PublishOutcome, StepReport, TelemetryNode};
pub use telemetry::{GasReadings, TelemetryPayload};
pub use thermal::{hottest_pixel, HotPixel, ScanBaseline};
