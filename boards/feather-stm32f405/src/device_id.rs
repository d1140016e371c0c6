#![deny(unsafe_code)]
#![deny(warnings)]
//! Device identifier for the STM32F405
//!
//! The factory-programmed 96-bit unique ID is stable across reboots and
//! unique to each chip. It backs the MQTT client id when none is configured.

use heapless::String;
use static_cell::StaticCell;

const CLIENT_ID_PREFIX: &str = "stm32f405-";

/// "stm32f405-" (10 chars) + 24 hex chars
const CLIENT_ID_MAX_LEN: usize = 34;

/// MQTT client id in the form `stm32f405-{24 hex chars}`
///
/// Built once; later calls return `None`.
///
/// ```no_run
/// let client_id = device_id::mqtt_client_id();
/// // Some("stm32f405-0123456789abcdef01234567")
/// ```
pub fn mqtt_client_id() -> Option<&'static str> {
    static CLIENT_ID: StaticCell<String<CLIENT_ID_MAX_LEN>> = StaticCell::new();

    let mut client_id = String::<CLIENT_ID_MAX_LEN>::new();
    // cannot fail: prefix and UID fill the capacity exactly
    let _ = client_id.push_str(CLIENT_ID_PREFIX);
    let _ = client_id.push_str(embassy_stm32::uid::uid_hex());

    let id: &'static String<CLIENT_ID_MAX_LEN> = CLIENT_ID.try_init(client_id)?;
    Some(id.as_str())
}
