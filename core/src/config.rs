//! Node configuration structures
//!
//! All values are process-wide constants. Boards build a `NodeConfig` once
//! (usually from compile-time environment) and hand it to the node.

use hal_abstractions::SessionIdentity;

use crate::thermal::ScanBaseline;

/// Device identifier embedded in every telemetry payload
pub const DEVICE_ID: &str = "a1BxBIKMsfi.seeed_gasmultisensor";

/// Method name embedded in every telemetry payload
pub const PROPERTY_POST_METHOD: &str = "thing.event.property.post";

/// Plaintext MQTT port
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Time between telemetry publications
pub const PUBLISH_INTERVAL_MS: u64 = 10_000;

/// Fixed delay between reconnect attempts (network and broker)
pub const RETRY_DELAY_MS: u64 = 5_000;

/// Wireless network credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WifiConfig {
    pub ssid: &'static str,
    pub passphrase: &'static str,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: "",
            passphrase: "",
        }
    }
}

/// Broker address, identity and topics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Broker hostname or dotted IPv4 address
    pub host: &'static str,
    pub port: u16,
    pub client_id: &'static str,
    pub username: &'static str,
    pub password: &'static str,
    /// Topic whose messages are echoed to the console
    pub subscribe_topic: &'static str,
    /// Topic telemetry is published to
    pub publish_topic: &'static str,
}

impl BrokerConfig {
    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity {
            client_id: self.client_id,
            username: self.username,
            password: self.password,
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "a1BxBIKMsfi.iot-as-mqtt.cn-shanghai.aliyuncs.com",
            port: DEFAULT_BROKER_PORT,
            client_id: "seeed_gasmultisensor",
            username: "",
            password: "",
            subscribe_topic: "/sys/a1BxBIKMsfi/seeed_gasmultisensor/thing/service/property/set",
            publish_topic: "/sys/a1BxBIKMsfi/seeed_gasmultisensor/thing/event/property/post",
        }
    }
}

/// Everything the telemetry node needs besides its drivers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeConfig {
    pub wifi: WifiConfig,
    pub broker: BrokerConfig,
    /// `id` field of the payload
    pub device_id: &'static str,
    /// `method` field of the payload
    pub method: &'static str,
    pub publish_interval_ms: u64,
    pub retry_delay_ms: u64,
    /// Starting point of the hottest-pixel scan
    pub scan_baseline: ScanBaseline,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            wifi: WifiConfig::default(),
            broker: BrokerConfig::default(),
            device_id: DEVICE_ID,
            method: PROPERTY_POST_METHOD,
            publish_interval_ms: PUBLISH_INTERVAL_MS,
            retry_delay_ms: RETRY_DELAY_MS,
            scan_baseline: ScanBaseline::Zero,
        }
    }
}
