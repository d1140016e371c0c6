#![deny(unsafe_code)]
#![deny(warnings)]
//! Network error types
//!
//! `NetworkError` is the board-side error for the Wi-Fi link, the TCP
//! transport and the MQTT session. Broker-protocol failures are grouped in
//! `MqttError` and lifted with `?`.

use defmt::Format;

/// MQTT session failures
#[derive(Debug, Clone, Copy, Format)]
pub enum MqttError {
    /// CONNECT rejected or not answered
    ConnectionFailed,
    /// PUBLISH could not be sent
    PublishFailed,
    /// SUBSCRIBE could not be sent
    SubscribeFailed,
    /// Malformed topic, client id or packet
    ProtocolError,
    /// No open session
    NotConnected,
}

/// Network operation errors
#[derive(Debug, Clone, Copy, Format)]
pub enum NetworkError {
    /// DNS resolution failed
    DnsError,
    /// Socket connect, read or write error
    SocketError,
    /// Co-processor rejected the join (bad credentials, no such network)
    WifiJoinFailed,
    /// Associated, but no DHCP lease in time
    DhcpTimeout,
    Mqtt(MqttError),
}

impl From<MqttError> for NetworkError {
    fn from(err: MqttError) -> Self {
        Self::Mqtt(err)
    }
}

impl core::fmt::Display for MqttError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ConnectionFailed => write!(f, "MQTT connection failed"),
            Self::PublishFailed => write!(f, "MQTT publish failed"),
            Self::SubscribeFailed => write!(f, "MQTT subscribe failed"),
            Self::ProtocolError => write!(f, "MQTT protocol error"),
            Self::NotConnected => write!(f, "MQTT not connected"),
        }
    }
}

impl core::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DnsError => write!(f, "DNS resolution failed"),
            Self::SocketError => write!(f, "Socket error"),
            Self::WifiJoinFailed => write!(f, "WiFi join failed"),
            Self::DhcpTimeout => write!(f, "DHCP timeout"),
            Self::Mqtt(e) => write!(f, "{}", e),
        }
    }
}

impl core::error::Error for MqttError {}

impl core::error::Error for NetworkError {}

impl embedded_io_async::Error for NetworkError {
    fn kind(&self) -> embedded_io_async::ErrorKind {
        match self {
            Self::SocketError => embedded_io_async::ErrorKind::BrokenPipe,
            _ => embedded_io_async::ErrorKind::Other,
        }
    }
}
