#![deny(warnings)]
//! MQTT broker session over plain TCP
//!
//! `MqttSession` implements `BrokerSession` with `rust-mqtt`. A connect
//! attempt runs:
//!
//! 1. resolve the broker (dotted IPv4 literal or DNS A record)
//! 2. open a TCP connection
//! 3. send CONNECT with the configured identity and wait for CONNACK
//!
//! The connected client is kept across scheduler steps. Its socket and
//! packet buffers come from `session_buffers`, which is why the previous
//! client is always dropped before a new attempt.
//!
//! Publishes and subscriptions use QoS 0. `poll` waits at most
//! `POLL_WINDOW_MS` for traffic so the scheduler step stays short.

#![allow(unsafe_code)] // Required for session buffer access and unchecked topic names

use core::net::Ipv4Addr;

use defmt::{debug, error, info, warn, Debug2Format};
use embassy_net::{dns::DnsQueryType, IpAddress, IpEndpoint, Stack};
use embassy_time::{with_timeout, Duration};
use hal_abstractions::{BrokerSession, ConnectErrorCode, InboundMessage, Inbox, SessionIdentity};
use rust_mqtt::{
    buffer::BumpBuffer,
    client::{
        event::Event,
        options::{
            ConnectOptions, PublicationOptions, RetainHandling, SubscriptionOptions,
            TopicReference,
        },
        Client,
    },
    config::{KeepAlive, SessionExpiryInterval},
    types::{MqttBinary, MqttString, QoS, TopicName},
    Bytes,
};

use crate::session_buffers;

use super::config::{BROKER_TIMEOUT_SECS, KEEP_ALIVE_SECS};
use super::error::{MqttError, NetworkError};
use super::socket::AsyncTcpSocket;

/// Upper bound on how long one poll waits for inbound traffic
const POLL_WINDOW_MS: u64 = 20;

type MqttClient = Client<'static, AsyncTcpSocket<'static>, BumpBuffer<'static>, 1, 1, 1, 0>;

/// Reject topic names MQTT does not allow for PUBLISH
///
/// Topic names cannot be empty or contain wildcards (`+`, `#`) or NUL.
fn validate_topic_name(topic: &str) -> Result<(), MqttError> {
    if topic.is_empty() || topic.contains(['+', '#', '\0']) {
        error!("Invalid MQTT topic name: {}", topic);
        return Err(MqttError::ProtocolError);
    }
    Ok(())
}

fn mqtt_string(value: &str) -> Result<MqttString<'_>, MqttError> {
    MqttString::new(value.into()).map_err(|e| {
        error!("Failed to create MQTT string: {:?}", Debug2Format(&e));
        MqttError::ProtocolError
    })
}

fn topic_name(topic: &str) -> Result<TopicName<'_>, MqttError> {
    validate_topic_name(topic)?;
    let value = mqtt_string(topic)?;
    // SAFETY: validate_topic_name() rejected empty names, wildcards and NUL,
    // which is everything TopicName checks for
    Ok(unsafe { TopicName::new_unchecked(value) })
}

/// MQTT session implementing `BrokerSession`
pub struct MqttSession {
    stack: Stack<'static>,
    identity: Option<SessionIdentity>,
    client: Option<MqttClient>,
}

impl MqttSession {
    pub fn new(stack: Stack<'static>) -> Self {
        Self {
            stack,
            identity: None,
            client: None,
        }
    }

    async fn resolve(&self, host: &str) -> Result<IpAddress, NetworkError> {
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Ok(IpAddress::Ipv4(ip));
        }

        self.stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|e| {
                error!("DNS query failed: {:?}", Debug2Format(&e));
                NetworkError::DnsError
            })?
            .first()
            .copied()
            .ok_or_else(|| {
                error!("DNS returned no results for {}", host);
                NetworkError::DnsError
            })
    }

    async fn open(&mut self, host: &str, port: u16) -> Result<(), NetworkError> {
        let identity = self.identity.ok_or(MqttError::ProtocolError)?;

        let endpoint = IpEndpoint::new(self.resolve(host).await?, port);
        info!("Resolved {} to {}", host, Debug2Format(&endpoint));

        // SAFETY: the previous client (and its socket) was dropped in
        // `connect`, and only this task owns the session
        let buffers = unsafe { session_buffers::session_buffers() };

        let mut socket = AsyncTcpSocket::new(self.stack, buffers.tcp_rx, buffers.tcp_tx);
        socket.connect(endpoint).await?;
        debug!("TCP connection established to {}", Debug2Format(&endpoint));

        let mut client = MqttClient::new(buffers.mqtt);

        let user_name = if identity.username.is_empty() {
            None
        } else {
            Some(mqtt_string(identity.username)?)
        };
        let password = if identity.password.is_empty() {
            None
        } else {
            Some(MqttBinary::new(Bytes::from(identity.password.as_bytes())).map_err(|e| {
                error!("Failed to create MQTT password: {:?}", Debug2Format(&e));
                MqttError::ProtocolError
            })?)
        };

        let connect_opts = ConnectOptions {
            session_expiry_interval: SessionExpiryInterval::EndOnDisconnect,
            clean_start: true,
            keep_alive: KeepAlive::Seconds(KEEP_ALIVE_SECS),
            will: None,
            user_name,
            password,
        };

        client
            .connect(socket, &connect_opts, Some(mqtt_string(identity.client_id)?))
            .await
            .map_err(|e| {
                error!("MQTT connect failed: {:?}", Debug2Format(&e));
                MqttError::ConnectionFailed
            })?;

        self.client = Some(client);
        Ok(())
    }

    fn client(&mut self) -> Result<&mut MqttClient, NetworkError> {
        self.client
            .as_mut()
            .ok_or(NetworkError::Mqtt(MqttError::NotConnected))
    }

    /// Drop the session after a transport failure so the next status poll
    /// reports it as lost
    fn fail<T>(&mut self, err: NetworkError) -> Result<T, NetworkError> {
        warn!("Broker session closed: {}", err);
        self.client = None;
        Err(err)
    }
}

impl BrokerSession for MqttSession {
    type Error = NetworkError;

    fn configure(&mut self, identity: SessionIdentity) {
        info!("MQTT client ID: {}", identity.client_id);
        self.identity = Some(identity);
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<(), ConnectErrorCode> {
        self.client = None;

        match with_timeout(
            Duration::from_secs(BROKER_TIMEOUT_SECS),
            self.open(host, port),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(NetworkError::Mqtt(MqttError::ConnectionFailed))) => {
                Err(ConnectErrorCode::ServerUnavailable)
            }
            Ok(Err(_)) => Err(ConnectErrorCode::ConnectionRefused),
            Err(_) => Err(ConnectErrorCode::Timeout),
        }
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), NetworkError> {
        let filter = topic_name(topic)?;
        let options = SubscriptionOptions {
            retain_handling: RetainHandling::SendIfNotSubscribedBefore,
            retain_as_published: false,
            no_local: false,
            qos: QoS::AtMostOnce,
        };

        let sent = match self.client()?.subscribe(filter.into(), options).await {
            Ok(_) => true,
            Err(e) => {
                error!("MQTT subscribe failed: {:?}", Debug2Format(&e));
                false
            }
        };
        if sent {
            Ok(())
        } else {
            self.fail(MqttError::SubscribeFailed.into())
        }
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), NetworkError> {
        let pub_options = PublicationOptions {
            retain: false,
            message_expiry_interval: None,
            topic: TopicReference::Name(topic_name(topic)?),
            qos: QoS::AtMostOnce,
        };

        let sent = match self
            .client()?
            .publish(&pub_options, Bytes::from(payload))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                error!("MQTT publish failed: {:?}", Debug2Format(&e));
                false
            }
        };
        if sent {
            Ok(())
        } else {
            self.fail(MqttError::PublishFailed.into())
        }
    }

    async fn poll(&mut self, inbox: &mut Inbox) -> Result<(), NetworkError> {
        while !inbox.is_full() {
            let window = Duration::from_millis(POLL_WINDOW_MS);
            let received = match with_timeout(window, self.client()?.poll()).await {
                // nothing pending
                Err(_) => return Ok(()),
                Ok(Ok(Event::Publish(publish))) => Ok(Some(InboundMessage::new(
                    publish.topic.as_ref(),
                    publish.message.as_ref(),
                ))),
                Ok(Ok(_)) => Ok(None),
                Ok(Err(e)) => {
                    error!("MQTT receive failed: {:?}", Debug2Format(&e));
                    Err(NetworkError::SocketError)
                }
            };

            match received {
                Ok(Some(message)) => {
                    if message.is_truncated() {
                        warn!(
                            "Inbound message truncated to {} of {} bytes",
                            message.payload.len(),
                            message.length
                        );
                    }
                    // cannot fail, checked by the loop condition
                    let _ = inbox.push(message);
                }
                Ok(None) => {}
                Err(err) => return self.fail(err),
            }
        }
        Ok(())
    }
}
