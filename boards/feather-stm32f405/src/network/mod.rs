#![deny(warnings)]
//! Network side of the node
//!
//! - **`config`**: compile-time credentials and timeouts
//! - **`error`**: `NetworkError` / `MqttError`
//! - **`wifi`**: esp-hosted co-processor bring-up and the `WirelessLink` impl
//! - **`socket`**: async TCP transport for the MQTT client
//! - **`mqtt`**: `rust-mqtt` session implementing `BrokerSession`
//!
//! ## Why a co-processor?
//!
//! The STM32F405 has no radio. An ESP32 running esp-hosted firmware handles
//! 802.11 and hands Ethernet frames over SPI; `embassy-net-esp-hosted`
//! turns that into an embassy-net device so TCP/IP, DHCP and DNS run on the
//! STM32 like they would over wired Ethernet.

pub mod config;
pub mod error;
pub mod mqtt;
pub mod socket;
pub mod wifi;

pub use mqtt::MqttSession;
pub use wifi::EspHostedLink;
