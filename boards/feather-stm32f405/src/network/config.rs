#![deny(unsafe_code)]
#![deny(warnings)]
//! Board configuration
//!
//! Credentials and broker settings are baked in at compile time from the
//! build environment. Anything left unset falls back to the defaults in
//! `monitor_core::config`.
//!
//! ```text
//! WIFI_SSID=... WIFI_PASSWORD=... MQTT_BROKER=... cargo run --release
//! ```

use monitor_core::config::{BrokerConfig, NodeConfig, WifiConfig, PUBLISH_INTERVAL_MS};

/// MQTT keep-alive; telemetry traffic alone keeps the session warm
pub const KEEP_ALIVE_SECS: u16 = 60;

/// Time allowed for the co-processor to associate and obtain a lease
pub const JOIN_TIMEOUT_SECS: u64 = 6;

/// Time allowed for DNS, TCP connect and CONNACK
pub const BROKER_TIMEOUT_SECS: u64 = 4;

// A reconnecting scheduler step runs one join and one broker connect back to
// back; together they must fit in one publish interval.
const _: () = assert!((JOIN_TIMEOUT_SECS + BROKER_TIMEOUT_SECS) * 1_000 <= PUBLISH_INTERVAL_MS);

/// Pause between scheduler steps
pub const STEP_PERIOD_MS: u64 = 50;

/// Build the node configuration from the compile-time environment
///
/// `fallback_client_id` is used when `MQTT_CLIENT_ID` is not set.
pub fn node_config(fallback_client_id: &'static str) -> NodeConfig {
    let broker = BrokerConfig::default();

    NodeConfig {
        wifi: WifiConfig {
            ssid: option_env!("WIFI_SSID").unwrap_or(""),
            passphrase: option_env!("WIFI_PASSWORD").unwrap_or(""),
        },
        broker: BrokerConfig {
            host: option_env!("MQTT_BROKER").unwrap_or(broker.host),
            client_id: option_env!("MQTT_CLIENT_ID").unwrap_or(fallback_client_id),
            username: option_env!("MQTT_USERNAME").unwrap_or(broker.username),
            password: option_env!("MQTT_PASSWORD").unwrap_or(broker.password),
            subscribe_topic: option_env!("MQTT_SUBSCRIBE_TOPIC").unwrap_or(broker.subscribe_topic),
            publish_topic: option_env!("MQTT_PUBLISH_TOPIC").unwrap_or(broker.publish_topic),
            ..broker
        },
        ..NodeConfig::default()
    }
}
