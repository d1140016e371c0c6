//! Telemetry node: device context and scheduler step
//!
//! `TelemetryNode` owns every driver, the configuration, both link states
//! and the last-publish tick. Boards call [`TelemetryNode::start`] once and
//! then [`TelemetryNode::step`] from their main loop:
//!
//! 1. service the wireless link (rejoin when the status poll says so)
//! 2. service the broker session (only while the network is up; a network
//!    drop also drops the session and the indicator)
//! 3. drain inbound broker messages to the console
//! 4. publish telemetry when the interval has elapsed
//!
//! `step` never sleeps. A failed (re)connect records a retry deadline and
//! returns, so inbound traffic and the telemetry timer keep running while a
//! link is down. Only `start` blocks, for the initial network join.
//!
//! A step does await each connect attempt it starts, so its worst case is
//! the driver's join timeout plus its broker connect timeout. Boards keep
//! that sum within `publish_interval_ms` so a reconnecting step delays at
//! most one telemetry cycle.
//!
//! # Example
//!
//! ```ignore
//! let mut node = TelemetryNode::new(config, Drivers { wifi, broker, gas, thermal, indicator });
//! node.start(&mut delay).await;
//! loop {
//!     node.step(Instant::now().as_millis()).await;
//!     Timer::after_millis(50).await;
//! }
//! ```

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use hal_abstractions::{
    BrokerSession, GasSensor, InboundMessage, Inbox, ThermalArray, WirelessLink, PIXEL_COUNT,
};

use crate::config::NodeConfig;
use crate::error::TelemetryError;
use crate::link::{Connection, LinkState};
use crate::telemetry::{GasReadings, TelemetryPayload, PAYLOAD_CAPACITY};
use crate::thermal::hottest_pixel;

/// The hardware a node runs on
pub struct Drivers<W, B, G, T, L> {
    pub wifi: W,
    pub broker: B,
    pub gas: G,
    pub thermal: T,
    /// High while the broker session is up
    pub indicator: L,
}

/// What happened to the telemetry timer during a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PublishOutcome {
    /// Interval not yet elapsed
    NotDue,
    /// Payload handed to the broker
    Sent,
    /// Cycle ran (timestamp advanced) but nothing reached the broker
    Skipped(TelemetryError),
}

/// Observable result of one scheduler step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StepReport {
    pub network: LinkState,
    pub session: LinkState,
    /// Inbound messages drained this step
    pub received: usize,
    pub publish: PublishOutcome,
}

/// Device context for the telemetry node
pub struct TelemetryNode<W, B, G, T, L> {
    config: NodeConfig,
    wifi: W,
    broker: B,
    gas: G,
    thermal: T,
    indicator: L,
    network: Connection,
    session: Connection,
    last_publish_ms: u64,
}

impl<W, B, G, T, L> TelemetryNode<W, B, G, T, L>
where
    W: WirelessLink,
    B: BrokerSession,
    G: GasSensor,
    T: ThermalArray,
    L: OutputPin,
{
    pub fn new(config: NodeConfig, drivers: Drivers<W, B, G, T, L>) -> Self {
        let Drivers {
            wifi,
            broker,
            gas,
            thermal,
            indicator,
        } = drivers;

        Self {
            network: Connection::new(config.retry_delay_ms),
            session: Connection::new(config.retry_delay_ms),
            config,
            wifi,
            broker,
            gas,
            thermal,
            indicator,
            last_publish_ms: 0,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn network_state(&self) -> LinkState {
        self.network.state()
    }

    pub fn session_state(&self) -> LinkState {
        self.session.state()
    }

    /// Tick of the most recent telemetry cycle
    pub fn last_publish_ms(&self) -> u64 {
        self.last_publish_ms
    }

    pub fn wifi(&self) -> &W {
        &self.wifi
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn indicator(&self) -> &L {
        &self.indicator
    }

    /// Hand the drivers back
    pub fn release(self) -> Drivers<W, B, G, T, L> {
        Drivers {
            wifi: self.wifi,
            broker: self.broker,
            gas: self.gas,
            thermal: self.thermal,
            indicator: self.indicator,
        }
    }

    /// Boot sequence: sensors, broker identity, then a blocking network join
    ///
    /// Sensor failures are logged and ignored. Returns the number of failed
    /// join attempts before the network came up.
    pub async fn start<D: DelayNs>(&mut self, delay: &mut D) -> u32 {
        self.init_sensors();
        self.broker.configure(self.config.broker.identity());
        let _ = self.indicator.set_low();
        self.join_network_blocking(delay).await
    }

    fn init_sensors(&mut self) {
        match self.gas.init() {
            Ok(()) => info!("Gas sensor ready"),
            Err(_) => warn!("Gas sensor init failed, continuing"),
        }
        match self.thermal.init() {
            Ok(()) => info!("Thermal array ready"),
            Err(_) => warn!("Thermal array init failed, continuing"),
        }
    }

    /// Retry the join with a fixed delay until the link reports connected
    ///
    /// Returns the number of failed attempts.
    pub async fn join_network_blocking<D: DelayNs>(&mut self, delay: &mut D) -> u32 {
        let ssid = self.config.wifi.ssid;
        let passphrase = self.config.wifi.passphrase;
        let delay_ms = u32::try_from(self.config.retry_delay_ms).unwrap_or(u32::MAX);

        info!("Connecting WiFi to: {}", ssid);
        self.wifi.leave().await;

        let mut failures = 0u32;
        loop {
            self.network.begin_attempt();
            info!("Attempting WiFi connection...");

            let joined = self.wifi.join(ssid, passphrase).await.is_ok();
            if joined && self.wifi.status().is_connected() {
                self.network.mark_connected();
                self.log_link_info();
                return failures;
            }

            failures = failures.saturating_add(1);
            warn!(
                "Failed to connect to WiFi (attempt {}), try again in {} ms",
                failures, delay_ms
            );
            delay.delay_ms(delay_ms).await;
        }
    }

    /// One pass of the main loop at tick `now_ms`
    pub async fn step(&mut self, now_ms: u64) -> StepReport {
        self.service_network(now_ms).await;
        self.service_session(now_ms).await;
        let received = self.drain_inbound().await;

        let publish = if self.publish_due(now_ms) {
            self.publish_telemetry(now_ms).await
        } else {
            PublishOutcome::NotDue
        };

        StepReport {
            network: self.network.state(),
            session: self.session.state(),
            received,
            publish,
        }
    }

    /// At least one full interval since the last cycle
    pub fn publish_due(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_publish_ms) >= self.config.publish_interval_ms
    }

    async fn service_network(&mut self, now_ms: u64) {
        if self.wifi.status().is_connected() {
            if self.network.mark_connected() {
                self.log_link_info();
            }
            return;
        }

        if self.network.is_connected() {
            warn!("WiFi connection lost ({})", self.wifi.status());
            self.network.mark_lost();
            self.drop_session();
        }
        if !self.network.attempt_due(now_ms) {
            return;
        }

        let wifi = self.config.wifi;
        if self.network.is_first_attempt() {
            info!("Connecting WiFi to: {}", wifi.ssid);
            self.wifi.leave().await;
        }

        self.network.begin_attempt();
        info!("Attempting WiFi connection...");
        let joined = self.wifi.join(wifi.ssid, wifi.passphrase).await.is_ok();
        if joined && self.wifi.status().is_connected() {
            self.network.mark_connected();
            self.log_link_info();
        } else {
            self.network.attempt_failed(now_ms);
            warn!(
                "Failed to connect to WiFi (attempt {}), try again in {} ms",
                self.network.retry().attempts(),
                self.config.retry_delay_ms
            );
        }
    }

    fn log_link_info(&self) {
        info!("WiFi connected");
        if let Some(link) = self.wifi.info() {
            let ip = link.address;
            info!("IP address: {}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3]);
            match link.rssi {
                Some(rssi) => info!("WiFi RSSI: {} dBm", rssi),
                None => info!("WiFi RSSI: unknown"),
            }
            match link.firmware.as_ref() {
                Some(version) => info!("Firmware version: {}", version.as_str()),
                None => info!("Firmware version: unknown"),
            }
        }
    }

    /// The broker session only counts while the network under it is up
    fn session_usable(&self) -> bool {
        self.network.is_connected() && self.session.is_connected()
    }

    fn drop_session(&mut self) {
        if self.session.is_connected() {
            warn!("Broker session dropped with the network");
            self.session.mark_lost();
        }
        let _ = self.indicator.set_low();
    }

    async fn service_session(&mut self, now_ms: u64) {
        if !self.network.is_connected() {
            if self.session.is_connected() {
                self.drop_session();
            }
            return;
        }

        if self.broker.is_connected() {
            if self.session.mark_connected() {
                let _ = self.indicator.set_high();
            }
            return;
        }

        if self.session.is_connected() {
            warn!("Broker session lost");
            self.session.mark_lost();
            let _ = self.indicator.set_low();
        }
        if !self.session.attempt_due(now_ms) {
            return;
        }

        let broker = self.config.broker;
        if self.session.is_first_attempt() {
            info!("Connecting MQTT...");
        }

        self.session.begin_attempt();
        info!("Attempting to MQTT broker: {}:{}", broker.host, broker.port);
        match self.broker.connect(broker.host, broker.port).await {
            Ok(()) => {
                info!("Connected to MQTT broker");
                let _ = self.indicator.set_high();
                self.session.mark_connected();

                match self.broker.subscribe(broker.subscribe_topic).await {
                    Ok(()) => info!("Subscribed to {}", broker.subscribe_topic),
                    Err(_) => warn!("Subscribe to {} failed", broker.subscribe_topic),
                }
            }
            Err(code) => {
                let _ = self.indicator.set_low();
                self.session.attempt_failed(now_ms);
                warn!(
                    "MQTT connection failed! Error code: {} ({}), try again in {} ms",
                    code.code(),
                    code,
                    self.config.retry_delay_ms
                );
            }
        }
    }

    /// Move pending inbound messages to the console; returns how many
    async fn drain_inbound(&mut self) -> usize {
        if !self.session_usable() {
            return 0;
        }

        let mut inbox = Inbox::new();
        if self.broker.poll(&mut inbox).await.is_err() {
            warn!("Broker poll failed");
        }
        for message in inbox.iter() {
            log_inbound(message);
        }
        inbox.len()
    }

    async fn publish_telemetry(&mut self, now_ms: u64) -> PublishOutcome {
        self.last_publish_ms = now_ms;

        let gas = GasReadings::read(&mut self.gas);
        let frame = self.thermal.read_frame().unwrap_or_else(|_| {
            warn!("Thermal frame read failed, reporting 0");
            [0.0; PIXEL_COUNT]
        });
        let hottest = hottest_pixel(&frame, self.config.scan_baseline);
        debug!(
            "Hottest pixel {} at {} C",
            hottest.index, hottest.temperature
        );

        let payload = TelemetryPayload::new(
            self.config.device_id,
            self.config.method,
            gas,
            hottest.temperature,
        );
        let mut buf = [0u8; PAYLOAD_CAPACITY];
        let len = match payload.serialize(&mut buf) {
            Ok(len) => len,
            Err(e) => {
                error!("Telemetry payload not serialized: {}", e);
                return PublishOutcome::Skipped(e);
            }
        };
        let json = &buf[..len];

        info!(
            "Publishing message: {}",
            core::str::from_utf8(json).unwrap_or("<invalid utf-8>")
        );

        if !self.session_usable() {
            warn!("Broker not connected, telemetry dropped");
            return PublishOutcome::Skipped(TelemetryError::SessionDown);
        }
        match self
            .broker
            .publish(self.config.broker.publish_topic, json)
            .await
        {
            Ok(()) => PublishOutcome::Sent,
            Err(_) => {
                warn!("Publish to {} failed", self.config.broker.publish_topic);
                PublishOutcome::Skipped(TelemetryError::PublishFailed)
            }
        }
    }
}

fn log_inbound(message: &InboundMessage) {
    info!(
        "Received a message with topic '{}', length {} bytes:",
        message.topic.as_str(),
        message.length
    );
    match core::str::from_utf8(&message.payload) {
        Ok(text) => info!("{}", text),
        Err(_) => info!("{=[u8]:a}", message.payload.as_slice()),
    }
}
