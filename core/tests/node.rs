//! Scheduler tests against in-memory drivers

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use embassy_futures::block_on;
use hal_abstractions::broker::INBOX_CAPACITY;
use hal_abstractions::{
    BrokerSession, ConnectErrorCode, Frame, GasSensor, InboundMessage, Inbox, LinkInfo,
    LinkStatus, SessionIdentity, ThermalArray, WirelessLink, PIXEL_COUNT,
};
use monitor_core::{
    Drivers, LinkState, NodeConfig, PublishOutcome, TelemetryError, TelemetryNode, WifiConfig,
};

#[derive(Default)]
struct WifiState {
    fail_joins: u32,
    joins: u32,
    leaves: u32,
    connected: bool,
}

#[derive(Clone, Default)]
struct FakeWifi(Rc<RefCell<WifiState>>);

impl WirelessLink for FakeWifi {
    type Error = ();

    async fn join(&mut self, _ssid: &str, _passphrase: &str) -> Result<(), ()> {
        let mut s = self.0.borrow_mut();
        s.joins += 1;
        if s.fail_joins > 0 {
            s.fail_joins -= 1;
            s.connected = false;
            return Err(());
        }
        s.connected = true;
        Ok(())
    }

    async fn leave(&mut self) {
        let mut s = self.0.borrow_mut();
        s.leaves += 1;
        s.connected = false;
    }

    fn status(&self) -> LinkStatus {
        if self.0.borrow().connected {
            LinkStatus::Connected
        } else {
            LinkStatus::Idle
        }
    }

    fn info(&self) -> Option<LinkInfo> {
        self.0.borrow().connected.then(|| LinkInfo {
            address: [192, 168, 1, 20],
            rssi: Some(-55),
            firmware: None,
        })
    }
}

#[derive(Default)]
struct BrokerState {
    fail_connects: u32,
    fail_publish: bool,
    connect_calls: u32,
    identity: Option<SessionIdentity>,
    endpoint: Option<(String, u16)>,
    connected: bool,
    subscribed: Vec<String>,
    published: Vec<(String, String)>,
    pending: Vec<InboundMessage>,
}

#[derive(Clone, Default)]
struct FakeBroker(Rc<RefCell<BrokerState>>);

impl BrokerSession for FakeBroker {
    type Error = ();

    fn configure(&mut self, identity: SessionIdentity) {
        self.0.borrow_mut().identity = Some(identity);
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<(), ConnectErrorCode> {
        let mut s = self.0.borrow_mut();
        s.connect_calls += 1;
        s.endpoint = Some((host.into(), port));
        if s.fail_connects > 0 {
            s.fail_connects -= 1;
            return Err(ConnectErrorCode::ConnectionRefused);
        }
        s.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.0.borrow().connected
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), ()> {
        self.0.borrow_mut().subscribed.push(topic.into());
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ()> {
        let mut s = self.0.borrow_mut();
        if s.fail_publish {
            return Err(());
        }
        let body = String::from_utf8(payload.to_vec()).map_err(|_| ())?;
        s.published.push((topic.into(), body));
        Ok(())
    }

    async fn poll(&mut self, inbox: &mut Inbox) -> Result<(), ()> {
        let mut s = self.0.borrow_mut();
        let take = s.pending.len().min(INBOX_CAPACITY - inbox.len());
        for message in s.pending.drain(..take) {
            inbox.push(message).map_err(|_| ())?;
        }
        Ok(())
    }
}

struct FakeGas {
    values: [f32; 4],
    fail: bool,
}

impl FakeGas {
    fn read(&self, channel: usize) -> Result<f32, ()> {
        if self.fail {
            Err(())
        } else {
            Ok(self.values[channel])
        }
    }
}

impl GasSensor for FakeGas {
    type Error = ();

    fn init(&mut self) -> Result<(), ()> {
        Ok(())
    }

    fn measure_no2(&mut self) -> Result<f32, ()> {
        self.read(0)
    }

    fn measure_c2h5oh(&mut self) -> Result<f32, ()> {
        self.read(1)
    }

    fn measure_voc(&mut self) -> Result<f32, ()> {
        self.read(2)
    }

    fn measure_co(&mut self) -> Result<f32, ()> {
        self.read(3)
    }
}

struct FakeThermal {
    frame: Option<Frame>,
}

impl ThermalArray for FakeThermal {
    type Error = ();

    fn init(&mut self) -> Result<(), ()> {
        Ok(())
    }

    fn pixel_temperature(&mut self, index: u8) -> Result<f32, ()> {
        self.frame.map(|f| f[index as usize]).ok_or(())
    }

    fn read_frame(&mut self) -> Result<Frame, ()> {
        self.frame.ok_or(())
    }
}

#[derive(Clone, Default)]
struct FakePin(Rc<RefCell<Option<bool>>>);

impl FakePin {
    fn is_high(&self) -> Option<bool> {
        *self.0.borrow()
    }
}

impl embedded_hal::digital::ErrorType for FakePin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        *self.0.borrow_mut() = Some(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        *self.0.borrow_mut() = Some(true);
        Ok(())
    }
}

#[derive(Default)]
struct FakeDelay {
    delays_ms: Vec<u32>,
}

impl embedded_hal_async::delay::DelayNs for FakeDelay {
    async fn delay_ns(&mut self, _ns: u32) {}

    async fn delay_ms(&mut self, ms: u32) {
        self.delays_ms.push(ms);
    }
}

type Node = TelemetryNode<FakeWifi, FakeBroker, FakeGas, FakeThermal, FakePin>;

struct Rig {
    node: Node,
    wifi: FakeWifi,
    broker: FakeBroker,
    led: FakePin,
}

fn test_config() -> NodeConfig {
    NodeConfig {
        wifi: WifiConfig {
            ssid: "kitchen",
            passphrase: "hunter22",
        },
        ..NodeConfig::default()
    }
}

fn hot_frame() -> Frame {
    let mut frame = [21.5; PIXEL_COUNT];
    frame[27] = 36.7;
    frame[28] = 30.0;
    frame
}

fn rig_with(gas: FakeGas, thermal: FakeThermal) -> Rig {
    let wifi = FakeWifi::default();
    let broker = FakeBroker::default();
    let led = FakePin::default();
    let node = TelemetryNode::new(
        test_config(),
        Drivers {
            wifi: wifi.clone(),
            broker: broker.clone(),
            gas,
            thermal,
            indicator: led.clone(),
        },
    );
    Rig {
        node,
        wifi,
        broker,
        led,
    }
}

fn rig() -> Rig {
    rig_with(
        FakeGas {
            values: [0.12, 0.05, 0.30, 0.02],
            fail: false,
        },
        FakeThermal {
            frame: Some(hot_frame()),
        },
    )
}

/// Boot and bring the broker session up at tick 0
fn online_rig() -> Rig {
    let mut rig = rig();
    block_on(rig.node.start(&mut FakeDelay::default()));
    let report = block_on(rig.node.step(0));
    assert_eq!(report.session, LinkState::Connected);
    rig
}

#[test]
fn test_start_blocks_until_joined() {
    let mut rig = rig();
    rig.wifi.0.borrow_mut().fail_joins = 2;
    let mut delay = FakeDelay::default();

    let failures = block_on(rig.node.start(&mut delay));

    assert_eq!(failures, 2);
    assert_eq!(delay.delays_ms, [5_000, 5_000]);
    let wifi = rig.wifi.0.borrow();
    assert_eq!(wifi.joins, 3);
    assert_eq!(wifi.leaves, 1);
    assert_eq!(rig.node.network_state(), LinkState::Connected);
    assert_eq!(rig.node.session_state(), LinkState::Disconnected);
    assert_eq!(rig.led.is_high(), Some(false));

    let identity = rig.broker.0.borrow().identity.unwrap();
    assert_eq!(identity.client_id, rig.node.config().broker.client_id);
    assert_eq!(rig.broker.0.borrow().connect_calls, 0);
}

#[test]
fn test_step_retries_network_without_blocking() {
    let mut rig = rig();
    rig.wifi.0.borrow_mut().fail_joins = 1;

    let report = block_on(rig.node.step(0));
    assert_eq!(report.network, LinkState::Connecting);
    assert_eq!(report.session, LinkState::Disconnected);
    assert_eq!(report.publish, PublishOutcome::NotDue);

    // still inside the retry delay
    block_on(rig.node.step(4_999));
    assert_eq!(rig.wifi.0.borrow().joins, 1);

    let report = block_on(rig.node.step(5_000));
    assert_eq!(report.network, LinkState::Connected);
    assert_eq!(report.session, LinkState::Connected);

    let wifi = rig.wifi.0.borrow();
    assert_eq!(wifi.joins, 2);
    // leave only before the first attempt of the cycle
    assert_eq!(wifi.leaves, 1);
}

#[test]
fn test_broker_waits_for_network() {
    let mut rig = rig();
    rig.wifi.0.borrow_mut().fail_joins = u32::MAX;

    for now in [0, 5_000, 10_000, 15_000] {
        let report = block_on(rig.node.step(now));
        assert_eq!(report.network, LinkState::Connecting);
        assert_eq!(report.session, LinkState::Disconnected);
    }
    assert_eq!(rig.broker.0.borrow().connect_calls, 0);
    assert_eq!(rig.wifi.0.borrow().joins, 4);
}

#[test]
fn test_broker_retry_and_indicator() {
    let mut rig = rig();
    rig.broker.0.borrow_mut().fail_connects = 1;
    block_on(rig.node.start(&mut FakeDelay::default()));

    let report = block_on(rig.node.step(0));
    assert_eq!(report.session, LinkState::Connecting);
    assert_eq!(rig.led.is_high(), Some(false));

    block_on(rig.node.step(4_999));
    assert_eq!(rig.broker.0.borrow().connect_calls, 1);

    let report = block_on(rig.node.step(5_000));
    assert_eq!(report.session, LinkState::Connected);
    assert_eq!(rig.led.is_high(), Some(true));

    let broker = rig.broker.0.borrow();
    assert_eq!(broker.connect_calls, 2);
    let config = rig.node.config();
    assert_eq!(
        broker.endpoint,
        Some((config.broker.host.into(), config.broker.port))
    );
    assert_eq!(broker.subscribed, [config.broker.subscribe_topic]);
}

#[test]
fn test_publish_interval() {
    let mut rig = online_rig();

    assert_eq!(block_on(rig.node.step(9_999)).publish, PublishOutcome::NotDue);
    assert_eq!(block_on(rig.node.step(10_000)).publish, PublishOutcome::Sent);
    assert_eq!(rig.node.last_publish_ms(), 10_000);
    assert_eq!(block_on(rig.node.step(15_000)).publish, PublishOutcome::NotDue);
    assert_eq!(block_on(rig.node.step(20_000)).publish, PublishOutcome::Sent);
    assert_eq!(rig.broker.0.borrow().published.len(), 2);
}

#[test]
fn test_published_payload() {
    let mut rig = online_rig();
    block_on(rig.node.step(10_000));

    let broker = rig.broker.0.borrow();
    let (topic, body) = &broker.published[0];
    assert_eq!(topic, rig.node.config().broker.publish_topic);
    assert_eq!(
        body,
        "{\"id\":\"a1BxBIKMsfi.seeed_gasmultisensor\",\
         \"params\":{\"NO2\":0.12,\"C2H5OH\":0.05,\"VOC\":0.3,\"CO\":0.02,\"temperature\":36.7},\
         \"method\":\"thing.event.property.post\"}"
    );
}

#[test]
fn test_sensor_failures_publish_zeros() {
    let mut rig = rig_with(
        FakeGas {
            values: [1.0; 4],
            fail: true,
        },
        FakeThermal { frame: None },
    );
    block_on(rig.node.start(&mut FakeDelay::default()));
    block_on(rig.node.step(0));

    assert_eq!(block_on(rig.node.step(10_000)).publish, PublishOutcome::Sent);
    let broker = rig.broker.0.borrow();
    let body = &broker.published[0].1;
    for field in ["NO2", "C2H5OH", "VOC", "CO", "temperature"] {
        assert!(body.contains(&format!("\"{field}\":0")), "{body}");
    }
}

#[test]
fn test_all_cold_frame_reports_zero() {
    let mut rig = rig_with(
        FakeGas {
            values: [0.0; 4],
            fail: false,
        },
        FakeThermal {
            frame: Some([-5.0; PIXEL_COUNT]),
        },
    );
    block_on(rig.node.start(&mut FakeDelay::default()));
    block_on(rig.node.step(0));
    block_on(rig.node.step(10_000));

    let broker = rig.broker.0.borrow();
    assert!(broker.published[0].1.contains("\"temperature\":0"));
}

#[test]
fn test_cycle_counts_while_session_down() {
    let mut rig = rig();
    rig.broker.0.borrow_mut().fail_connects = u32::MAX;
    block_on(rig.node.start(&mut FakeDelay::default()));

    let report = block_on(rig.node.step(10_000));
    assert_eq!(
        report.publish,
        PublishOutcome::Skipped(TelemetryError::SessionDown)
    );
    assert_eq!(rig.node.last_publish_ms(), 10_000);
    assert_eq!(block_on(rig.node.step(15_000)).publish, PublishOutcome::NotDue);
    assert!(rig.broker.0.borrow().published.is_empty());
}

#[test]
fn test_publish_failure_not_retried() {
    let mut rig = online_rig();
    rig.broker.0.borrow_mut().fail_publish = true;

    assert_eq!(
        block_on(rig.node.step(10_000)).publish,
        PublishOutcome::Skipped(TelemetryError::PublishFailed)
    );
    rig.broker.0.borrow_mut().fail_publish = false;
    assert_eq!(block_on(rig.node.step(10_001)).publish, PublishOutcome::NotDue);
    assert!(rig.broker.0.borrow().published.is_empty());
}

#[test]
fn test_inbound_drained_in_batches() {
    let mut rig = online_rig();
    {
        let mut broker = rig.broker.0.borrow_mut();
        for i in 0..INBOX_CAPACITY + 2 {
            let topic = rig.node.config().broker.subscribe_topic;
            broker
                .pending
                .push(InboundMessage::new(topic, format!("{{\"seq\":{i}}}").as_bytes()));
        }
    }

    assert_eq!(block_on(rig.node.step(1)).received, INBOX_CAPACITY);
    assert_eq!(block_on(rig.node.step(2)).received, 2);
    assert_eq!(block_on(rig.node.step(3)).received, 0);
}

#[test]
fn test_reconnect_after_link_loss() {
    let mut rig = online_rig();
    assert_eq!(rig.wifi.0.borrow().leaves, 1);

    rig.wifi.0.borrow_mut().connected = false;
    rig.broker.0.borrow_mut().connected = false;

    let report = block_on(rig.node.step(3_000));
    assert_eq!(report.network, LinkState::Connected);
    assert_eq!(report.session, LinkState::Connected);
    assert_eq!(rig.wifi.0.borrow().leaves, 2);
    assert_eq!(rig.broker.0.borrow().connect_calls, 2);
    assert_eq!(rig.led.is_high(), Some(true));
}

#[test]
fn test_session_loss_clears_indicator() {
    let mut rig = online_rig();
    {
        let mut broker = rig.broker.0.borrow_mut();
        broker.connected = false;
        broker.fail_connects = 1;
    }

    let report = block_on(rig.node.step(1_000));
    assert_eq!(report.network, LinkState::Connected);
    assert_eq!(report.session, LinkState::Connecting);
    assert_eq!(rig.led.is_high(), Some(false));
}

#[test]
fn test_network_loss_takes_session_down() {
    let mut rig = online_rig();
    {
        let mut wifi = rig.wifi.0.borrow_mut();
        wifi.connected = false;
        wifi.fail_joins = u32::MAX;
    }
    let topic = rig.node.config().broker.subscribe_topic;
    rig.broker
        .0
        .borrow_mut()
        .pending
        .push(InboundMessage::new(topic, b"on"));

    let report = block_on(rig.node.step(1_000));
    assert_eq!(report.network, LinkState::Connecting);
    assert_eq!(report.session, LinkState::Disconnected);
    assert_eq!(report.received, 0);
    assert_eq!(rig.led.is_high(), Some(false));

    let report = block_on(rig.node.step(10_000));
    assert_eq!(report.session, LinkState::Disconnected);
    assert_eq!(
        report.publish,
        PublishOutcome::Skipped(TelemetryError::SessionDown)
    );
    assert_eq!(rig.node.last_publish_ms(), 10_000);
    {
        let broker = rig.broker.0.borrow();
        assert!(broker.published.is_empty());
        assert_eq!(broker.connect_calls, 1);
        assert_eq!(broker.pending.len(), 1);
    }

    // network back: the session is trusted again and the backlog drains
    rig.wifi.0.borrow_mut().fail_joins = 0;
    let report = block_on(rig.node.step(15_000));
    assert_eq!(report.network, LinkState::Connected);
    assert_eq!(report.session, LinkState::Connected);
    assert_eq!(report.received, 1);
    assert_eq!(rig.led.is_high(), Some(true));
}

#[test]
fn test_inbound_leaves_telemetry_untouched() {
    let mut rig = online_rig();
    assert_eq!(block_on(rig.node.step(10_000)).publish, PublishOutcome::Sent);
    let first_payload = rig.broker.0.borrow().published[0].clone();

    {
        let topic = rig.node.config().broker.subscribe_topic;
        let mut broker = rig.broker.0.borrow_mut();
        broker.pending.push(InboundMessage::new(topic, b"{\"params\":{\"NO2\":9.9}}"));
        broker.pending.push(InboundMessage::new(
            topic,
            first_payload.1.replace("36.7", "99").as_bytes(),
        ));
        broker.pending.push(InboundMessage::new(topic, &[0xffu8, 0x00, 0x7f]));
    }

    let report = block_on(rig.node.step(12_000));
    assert_eq!(report.received, 3);
    assert_eq!(report.publish, PublishOutcome::NotDue);
    assert_eq!(rig.node.last_publish_ms(), 10_000);
    assert_eq!(rig.broker.0.borrow().published.len(), 1);

    assert_eq!(block_on(rig.node.step(20_000)).publish, PublishOutcome::Sent);
    let broker = rig.broker.0.borrow();
    assert_eq!(broker.published.len(), 2);
    assert_eq!(broker.published[1], first_payload);
}
