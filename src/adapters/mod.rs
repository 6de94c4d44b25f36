//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                          | Connects to               |
//! |-------------|-------------------------------------|---------------------------|
//! | `hardware`  | InputPort, RelayPort, IndicatorPort | GPIO via embedded-hal     |
//! | `log_sink`  | EventSink                           | Serial log output         |
//! | `mqtt`      | BusPort                             | ESP-MQTT client           |
//! | `nvs`       | ConfigPort, StoragePort             | NVS / in-memory store     |
//! | `ota`       | UpdatePort                          | HTTP upload + esp-ota     |
//! | `portal`    | (used by `system`)                  | HTTP form server          |
//! | `system`    | PortalPort, UpdatePort, SystemPort  | WiFi AP, portal, restart  |
//! | `time`      | (clock)                             | ESP32 system timer        |
//! | `wifi`      | (link status for `mqtt`)            | ESP-IDF WiFi STA / AP     |
//! | `device_id` | (identity)                          | eFuse MAC                 |

pub mod device_id;
pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod ota;
pub mod portal;
pub mod system;
pub mod time;
pub mod wifi;
