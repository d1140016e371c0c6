//! Hardware abstraction traits for IoT firmware
//!
//! This crate defines traits that abstract over hardware differences
//! between boards. BSPs implement these traits.
//!
//! - **`sensors`**: gas and thermal-array traits plus `embedded-hal` I2C drivers
//!   for the Grove Multichannel Gas V2 and the AMG8833 Grid-EYE
//! - **`network`**: wireless link join/status
//! - **`broker`**: publish/subscribe session with poll-and-drain inbound delivery

#![no_std]
#![deny(unsafe_code)]
#![deny(warnings)]

pub mod broker;
pub mod network;
pub mod sensors;

pub use broker::{BrokerSession, ConnectErrorCode, InboundMessage, Inbox, SessionIdentity};
pub use network::{LinkInfo, LinkStatus, WirelessLink};
pub use sensors::{Frame, GasSensor, SensorError, ThermalArray, PIXEL_COUNT};
