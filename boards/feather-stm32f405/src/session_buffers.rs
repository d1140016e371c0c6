//! Static buffers for the broker session
//!
//! The MQTT client borrows its TCP socket buffers and its packet buffer for
//! as long as the session lives, and the session outlives any single
//! scheduler step. The buffers therefore live in statics and are handed out
//! again on every reconnect.
//!
//! # Buffer Sizing
//!
//! - TCP receive/transmit: 2 KB each. Telemetry is under 256 bytes and
//!   inbound messages are truncated to 256 bytes by the session.
//! - MQTT packet buffer: 2 KB for the bump allocator.
//!
//! # Safety
//!
//! `session_buffers` returns `'static` mutable references to the same
//! memory on every call. Callers must drop every borrow from the previous
//! call (the previous client and socket) before calling it again.

#![allow(unsafe_code)] // Required for static mut buffers
#![deny(warnings)]

use rust_mqtt::buffer::BumpBuffer;

/// TCP receive buffer size
const TCP_RX_BUF_SIZE: usize = 2048;

/// TCP transmit buffer size
const TCP_TX_BUF_SIZE: usize = 2048;

/// MQTT packet buffer size
const MQTT_BUF_SIZE: usize = 2048;

static mut TCP_RX_BUF: [u8; TCP_RX_BUF_SIZE] = [0; TCP_RX_BUF_SIZE];
static mut TCP_TX_BUF: [u8; TCP_TX_BUF_SIZE] = [0; TCP_TX_BUF_SIZE];
static mut MQTT_BUF: [u8; MQTT_BUF_SIZE] = [0; MQTT_BUF_SIZE];
static mut MQTT_BUMP: Option<BumpBuffer<'static>> = None;

/// Buffers for one broker session
pub struct SessionBuffers {
    pub tcp_rx: &'static mut [u8],
    pub tcp_tx: &'static mut [u8],
    /// Fresh bump allocator over the packet buffer
    pub mqtt: &'static mut BumpBuffer<'static>,
}

/// Hand out the session buffers
///
/// # Safety
///
/// The caller must ensure:
/// - at most one broker session exists at a time
/// - every reference from a previous call has been dropped
/// - the buffers are only touched from the task that owns the session
pub unsafe fn session_buffers() -> SessionBuffers {
    // SAFETY: caller guarantees exclusive access (see above)
    // Raw pointer dereference required per Rust 2024 edition
    let bump = &mut *core::ptr::addr_of_mut!(MQTT_BUMP);
    let packet_buf: &'static mut [u8] = &mut *core::ptr::addr_of_mut!(MQTT_BUF);

    SessionBuffers {
        tcp_rx: &mut *core::ptr::addr_of_mut!(TCP_RX_BUF),
        tcp_tx: &mut *core::ptr::addr_of_mut!(TCP_TX_BUF),
        mqtt: bump.insert(BumpBuffer::new(packet_buf)),
    }
}
