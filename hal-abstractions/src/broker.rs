//! Publish/subscribe broker session abstraction
//!
//! Inbound traffic is delivered by an explicit poll that drains whatever
//! has arrived into a caller-owned [`Inbox`]. There are no callbacks.

use core::future::Future;
use heapless::{String, Vec};

/// Maximum topic length kept for an inbound message
pub const MAX_TOPIC_LEN: usize = 64;

/// Maximum payload bytes kept for an inbound message
pub const MAX_PAYLOAD_LEN: usize = 256;

/// Messages drained per poll
pub const INBOX_CAPACITY: usize = 4;

/// A message received on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String<MAX_TOPIC_LEN>,
    /// Payload bytes, truncated to `MAX_PAYLOAD_LEN`
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
    /// Payload length as received, before truncation
    pub length: usize,
}

impl InboundMessage {
    /// Copy a received message, truncating anything that does not fit
    pub fn new(topic: &str, payload: &[u8]) -> Self {
        let mut kept_topic = String::new();
        for c in topic.chars() {
            if kept_topic.push(c).is_err() {
                break;
            }
        }
        let keep = payload.len().min(MAX_PAYLOAD_LEN);
        let mut kept_payload = Vec::new();
        // cannot fail, `keep` is within capacity
        let _ = kept_payload.extend_from_slice(&payload[..keep]);
        Self {
            topic: kept_topic,
            payload: kept_payload,
            length: payload.len(),
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.length > self.payload.len()
    }
}

/// Messages drained by one poll
pub type Inbox = Vec<InboundMessage, INBOX_CAPACITY>;

/// Static credentials applied once before the first connect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionIdentity {
    pub client_id: &'static str,
    pub username: &'static str,
    pub password: &'static str,
}

/// Why a connect attempt failed
///
/// Positive codes are MQTT 3.1.1 CONNACK return codes; negative codes are
/// client-side failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectErrorCode {
    /// Transport could not be opened or the broker closed it
    ConnectionRefused,
    /// No CONNACK in time
    Timeout,
    UnacceptableProtocolVersion,
    IdentifierRejected,
    ServerUnavailable,
    BadUsernameOrPassword,
    NotAuthorized,
}

impl ConnectErrorCode {
    /// Numeric code as logged on failure
    pub fn code(self) -> i8 {
        match self {
            Self::ConnectionRefused => -2,
            Self::Timeout => -1,
            Self::UnacceptableProtocolVersion => 1,
            Self::IdentifierRejected => 2,
            Self::ServerUnavailable => 3,
            Self::BadUsernameOrPassword => 4,
            Self::NotAuthorized => 5,
        }
    }

    /// Map a non-zero CONNACK return code
    pub fn from_connack(return_code: u8) -> Option<Self> {
        match return_code {
            1 => Some(Self::UnacceptableProtocolVersion),
            2 => Some(Self::IdentifierRejected),
            3 => Some(Self::ServerUnavailable),
            4 => Some(Self::BadUsernameOrPassword),
            5 => Some(Self::NotAuthorized),
            _ => None,
        }
    }
}

impl core::fmt::Display for ConnectErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ConnectionRefused => write!(f, "Connection refused"),
            Self::Timeout => write!(f, "Connection timeout"),
            Self::UnacceptableProtocolVersion => write!(f, "Unacceptable protocol version"),
            Self::IdentifierRejected => write!(f, "Identifier rejected"),
            Self::ServerUnavailable => write!(f, "Server unavailable"),
            Self::BadUsernameOrPassword => write!(f, "Bad user name or password"),
            Self::NotAuthorized => write!(f, "Not authorized"),
        }
    }
}

impl core::error::Error for ConnectErrorCode {}

/// Trait for a publish/subscribe broker session
///
/// # Example Implementation
/// ```ignore
/// impl BrokerSession for MqttSession {
///     type Error = NetworkError;
///     async fn connect(&mut self, host: &str, port: u16) -> Result<(), ConnectErrorCode> {
///         // open TCP, send CONNECT, wait for CONNACK
///     }
///     // ...
/// }
/// ```
pub trait BrokerSession {
    type Error;

    /// One-time setup of client id and credentials
    fn configure(&mut self, identity: SessionIdentity);

    /// Single connect attempt
    fn connect(
        &mut self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = Result<(), ConnectErrorCode>>;

    /// Whether the session is currently open
    fn is_connected(&self) -> bool;

    fn subscribe(&mut self, topic: &str) -> impl Future<Output = Result<(), Self::Error>>;

    /// Fire-and-forget publish of one message
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Service the connection (keep-alive) and move any received messages
    /// into `inbox`. Messages beyond the inbox capacity stay queued for the
    /// next poll.
    fn poll(&mut self, inbox: &mut Inbox) -> impl Future<Output = Result<(), Self::Error>>;
}
