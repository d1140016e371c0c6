#![deny(unsafe_code)]
#![deny(warnings)]
//! TCP transport for the MQTT client
//!
//! Wraps `embassy_net::tcp::TcpSocket` in the `embedded-io-async` traits that
//! `rust-mqtt` drives, mapping socket errors to `NetworkError`.

use embassy_net::tcp::TcpSocket;
use embassy_net::{IpEndpoint, Stack};
use defmt::{warn, Debug2Format};
use embassy_time::Duration;
use embedded_io_async::{ErrorType, Read, Write};

use super::config::KEEP_ALIVE_SECS;
use super::error::NetworkError;

/// 1.5x the MQTT keep-alive
const SOCKET_IDLE_TIMEOUT_SECS: u64 = 90;

/// Async TCP socket implementing embedded-io-async
pub struct AsyncTcpSocket<'a> {
    socket: TcpSocket<'a>,
}

impl<'a> AsyncTcpSocket<'a> {
    /// Create a socket over caller-owned buffers
    ///
    /// ```no_run
    /// let buffers = unsafe { session_buffers::session_buffers() };
    /// let socket = AsyncTcpSocket::new(stack, buffers.tcp_rx, buffers.tcp_tx);
    /// ```
    pub fn new(stack: Stack<'a>, rx_buffer: &'a mut [u8], tx_buffer: &'a mut [u8]) -> Self {
        let mut socket = TcpSocket::new(stack, rx_buffer, tx_buffer);
        // Half-open connections are dropped after this long without traffic
        socket.set_timeout(Some(Duration::from_secs(SOCKET_IDLE_TIMEOUT_SECS)));
        socket.set_keep_alive(Some(Duration::from_secs(u64::from(KEEP_ALIVE_SECS))));
        Self { socket }
    }

    /// Open the connection to `endpoint`
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::SocketError` if the handshake fails
    pub async fn connect(&mut self, endpoint: IpEndpoint) -> Result<(), NetworkError> {
        self.socket
            .connect(endpoint)
            .await
            .map_err(|e| {
                warn!("TCP connect to {} failed: {:?}", Debug2Format(&endpoint), Debug2Format(&e));
                NetworkError::SocketError
            })
    }
}

impl ErrorType for AsyncTcpSocket<'_> {
    type Error = NetworkError;
}

impl Read for AsyncTcpSocket<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.socket
            .read(buf)
            .await
            .map_err(|_| NetworkError::SocketError)
    }
}

impl Write for AsyncTcpSocket<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.socket
            .write(buf)
            .await
            .map_err(|_| NetworkError::SocketError)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.socket
            .flush()
            .await
            .map_err(|_| NetworkError::SocketError)
    }
}
