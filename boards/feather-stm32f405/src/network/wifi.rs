#![deny(unsafe_code)]
#![deny(warnings)]
//! Wi-Fi link over an ESP32 co-processor running esp-hosted firmware
//!
//! The co-processor sits on SPI2 with a handshake and a data-ready line.
//! `init` brings it up and returns the embassy-net device plus the runner
//! that must be polled for the link to work. `EspHostedLink` implements
//! `WirelessLink` on top of the control handle and the IP stack.

use defmt::{info, warn, Debug2Format};
use embassy_embedded_hal::shared_bus::asynch::spi::SpiDevice as SpiDeviceBus;
use embassy_net::Stack;
use embassy_net_esp_hosted::{Control, NetDriver, Runner, State};
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::Output;
use embassy_stm32::mode::Async;
use embassy_stm32::spi::Spi;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{with_timeout, Duration, Timer};
use hal_abstractions::{LinkInfo, LinkStatus, WirelessLink};
use static_cell::StaticCell;

use super::config::JOIN_TIMEOUT_SECS;
use super::error::NetworkError;

/// Co-processor SPI device; the bus sits behind an async mutex
pub type EspSpi =
    SpiDeviceBus<'static, CriticalSectionRawMutex, Spi<'static, Async>, Output<'static>>;

/// Runner type; poll continuously alongside the IP stack
pub type EspRunner = Runner<'static, EspSpi, ExtiInput<'static>, Output<'static>>;

/// Co-processor peripherals bundle
pub struct WifiPeripherals<'a> {
    pub spi: Spi<'a, Async>,
    pub cs: Output<'a>,
    pub reset: Output<'a>,
    pub handshake: ExtiInput<'a>,
    pub ready: ExtiInput<'a>,
}

/// Reset the co-processor and open the esp-hosted channel
///
/// Returns the network device for embassy-net, the control handle and the
/// runner.
pub async fn init(
    periph: WifiPeripherals<'static>,
) -> (NetDriver<'static>, Control<'static>, EspRunner) {
    let WifiPeripherals {
        spi,
        cs,
        mut reset,
        handshake,
        ready,
    } = periph;

    info!("Performing ESP32 co-processor reset...");
    reset.set_low();
    Timer::after_millis(10).await;

    type SpiBusType = embassy_sync::mutex::Mutex<CriticalSectionRawMutex, Spi<'static, Async>>;
    static SPI_BUS: StaticCell<SpiBusType> = StaticCell::new();
    let spi_bus = SPI_BUS.init(embassy_sync::mutex::Mutex::new(spi));
    let spi_device = SpiDeviceBus::new(spi_bus, cs);

    static STATE: StaticCell<State> = StaticCell::new();
    let state = STATE.init(State::new());

    // the driver releases reset itself once the lines are configured
    let (device, control, runner) =
        embassy_net_esp_hosted::new(state, spi_device, handshake, ready, reset).await;

    info!("ESP32 co-processor channel open");

    (device, control, runner)
}

/// `WirelessLink` backed by esp-hosted and the embassy-net stack
pub struct EspHostedLink {
    control: Control<'static>,
    stack: Stack<'static>,
    ready: bool,
    /// Outcome of the last join/leave, refined by the stack's live state
    last: LinkStatus,
}

impl EspHostedLink {
    pub fn new(control: Control<'static>, stack: Stack<'static>) -> Self {
        Self {
            control,
            stack,
            ready: false,
            last: LinkStatus::Idle,
        }
    }

    fn is_up(&self) -> bool {
        self.stack.is_link_up() && self.stack.config_v4().is_some()
    }

    /// Co-processor init is retried as part of the next join if it fails
    async fn ensure_ready(&mut self) -> Result<(), NetworkError> {
        if self.ready {
            return Ok(());
        }
        self.control.init().await.map_err(|e| {
            warn!("ESP32 init failed: {:?}", Debug2Format(&e));
            NetworkError::WifiJoinFailed
        })?;
        self.ready = true;
        Ok(())
    }

    async fn try_join(&mut self, ssid: &str, passphrase: &str) -> Result<(), NetworkError> {
        self.ensure_ready().await?;

        self.control.connect(ssid, passphrase).await.map_err(|e| {
            warn!("WiFi join rejected: {:?}", Debug2Format(&e));
            NetworkError::WifiJoinFailed
        })?;

        info!("Associated, waiting for DHCP...");
        with_timeout(
            Duration::from_secs(JOIN_TIMEOUT_SECS),
            self.stack.wait_config_up(),
        )
        .await
        .map_err(|_| NetworkError::DhcpTimeout)
    }
}

impl WirelessLink for EspHostedLink {
    type Error = NetworkError;

    async fn join(&mut self, ssid: &str, passphrase: &str) -> Result<(), NetworkError> {
        let result = self.try_join(ssid, passphrase).await;
        self.last = if result.is_ok() {
            LinkStatus::Connected
        } else {
            LinkStatus::ConnectFailed
        };
        result
    }

    async fn leave(&mut self) {
        if self.ready {
            if let Err(e) = self.control.disconnect().await {
                warn!("WiFi disconnect failed: {:?}", Debug2Format(&e));
            }
        }
        self.last = LinkStatus::Disconnected;
    }

    fn status(&self) -> LinkStatus {
        match (self.last, self.is_up()) {
            (LinkStatus::Connected, true) => LinkStatus::Connected,
            (LinkStatus::Connected, false) => LinkStatus::ConnectionLost,
            (last, _) => last,
        }
    }

    fn info(&self) -> Option<LinkInfo> {
        if !self.status().is_connected() {
            return None;
        }
        let config = self.stack.config_v4()?;
        Some(LinkInfo {
            address: config.address.address().octets(),
            // not exposed by the esp-hosted control channel
            rssi: None,
            firmware: None,
        })
    }
}
