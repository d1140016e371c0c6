//! Wireless network link abstraction

use core::future::Future;
use heapless::String;

/// Association state as reported by the wireless driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkStatus {
    /// Radio up, no join attempted yet
    Idle,
    /// Associated and holding an address
    Connected,
    /// Last join attempt failed
    ConnectFailed,
    /// Association dropped after being connected
    ConnectionLost,
    /// Deliberately left the network
    Disconnected,
}

impl LinkStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Details logged after a successful join
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkInfo {
    /// Assigned IPv4 address
    pub address: [u8; 4],
    /// Received signal strength in dBm, when the driver can report it
    pub rssi: Option<i16>,
    /// Radio co-processor firmware version, when the driver can report it
    pub firmware: Option<String<16>>,
}

/// Trait for a wireless network connection with static credentials
///
/// Implementors report status by polling; there is no event callback.
/// The caller decides when to (re)join.
pub trait WirelessLink {
    type Error;

    /// Attempt a single join. Resolves once the attempt has either produced a
    /// usable connection or failed.
    fn join(
        &mut self,
        ssid: &str,
        passphrase: &str,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Drop any association, ignoring errors
    fn leave(&mut self) -> impl Future<Output = ()>;

    /// Current connection status
    fn status(&self) -> LinkStatus;

    /// Address and radio details while connected
    fn info(&self) -> Option<LinkInfo>;
}
