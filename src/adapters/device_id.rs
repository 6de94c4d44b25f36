//! Device identity derived from the ESP32 factory MAC address.
//!
//! The default MQTT client id and the soft-AP SSID are both built from the
//! last three MAC bytes, so they are stable across reboots and unique per
//! board.

use crate::config::{DeviceConfig, ShortString};

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Default client id: `duorelay-xxyyzz`.
pub fn client_id(mac: &MacAddress) -> ShortString {
    let mut id = ShortString::new();
    use core::fmt::Write;
    let _ = write!(id, "duorelay-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    id
}

/// Soft-AP SSID for the configuration portal: `DuoRelay-XXYYZZ`.
pub fn portal_ssid(mac: &MacAddress) -> ShortString {
    let mut ssid = ShortString::new();
    use core::fmt::Write;
    let _ = write!(ssid, "DuoRelay-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    ssid
}

/// Fill in the client id when none is configured.
pub fn apply_default_client_id(config: &mut DeviceConfig, mac: &MacAddress) {
    if config.broker.client_id.is_empty() {
        config.broker.client_id = client_id(mac);
    }
}
