//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ RelayModule (domain)
//! ```
//!
//! Driven adapters (GPIO, MQTT client, NVS, portal, OTA, event sinks)
//! implement these traits.  The [`RelayModule`](super::service::RelayModule)
//! consumes them via generics, so the domain core never touches hardware
//! directly.

use crate::channel::Channel;
use crate::config::{BrokerConfig, DeviceConfig};

// ───────────────────────────────────────────────────────────────
// Input port (driven adapter: GPIO → domain)
// ───────────────────────────────────────────────────────────────

/// Raw electrical line levels sampled once per cycle.
///
/// `true` = line high.  All three inputs are active-low, so a closed
/// contact reads `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInputs {
    pub switches: [bool; 2],
    pub mode_button: bool,
}

impl Default for RawInputs {
    /// All contacts open (pulled up).
    fn default() -> Self {
        Self {
            switches: [true; 2],
            mode_button: true,
        }
    }
}

pub trait InputPort {
    fn read_inputs(&mut self) -> RawInputs;
}

// ───────────────────────────────────────────────────────────────
// Relay + indicator ports (driven adapter: domain → GPIO)
// ───────────────────────────────────────────────────────────────

pub trait RelayPort {
    /// Drive one relay coil.  `true` = energized.
    fn set_relay(&mut self, channel: Channel, energized: bool);
}

pub trait IndicatorPort {
    /// Light or extinguish the status indicator.
    fn set_indicator(&mut self, lit: bool);
}

// ───────────────────────────────────────────────────────────────
// Bus port (driven adapter: domain ↔ MQTT client)
// ───────────────────────────────────────────────────────────────

/// Message-bus session as seen by the domain.
///
/// Inbound messages do not flow through this trait; the adapter pushes
/// them onto the inbound queue ([`crate::events`]).
pub trait BusPort {
    fn is_connected(&self) -> bool;

    /// Open a session with the given broker credentials.
    fn connect(&mut self, broker: &BrokerConfig) -> Result<(), BusError>;

    fn subscribe(&mut self, topic: &str) -> Result<(), BusError>;

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BusError>;
}

// ───────────────────────────────────────────────────────────────
// Collaborator ports (portal, firmware update, system)
// ───────────────────────────────────────────────────────────────

/// Soft-AP configuration portal.
pub trait PortalPort {
    fn start_portal(&mut self) -> Result<(), ConnectivityError>;

    fn stop_portal(&mut self);

    /// True while the portal is still answering a request (e.g. flushing
    /// the response to a save).  Restart waits for this to clear.
    fn portal_busy(&self) -> bool {
        false
    }
}

/// Over-the-air firmware update session.
pub trait UpdatePort {
    fn begin_update(&mut self) -> Result<(), UpdateError>;

    /// Abandon an unfinished session.  No-op when none is open.
    fn abort_update(&mut self);

    /// True while image data is being written or finalized.
    fn update_busy(&self) -> bool {
        false
    }
}

pub trait SystemPort {
    /// Reboot the device.  Does not return on hardware.
    fn restart(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists device configuration.
///
/// Implementations MUST validate before persisting and reject invalid
/// values with [`ConfigError::ValidationFailed`].
pub trait ConfigPort {
    /// Load configuration.  Unreadable fields fall back to defaults; a
    /// missing record yields [`ConfigError::NotFound`].
    fn load(&self) -> Result<DeviceConfig, ConfigError>;

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// Write operations MUST be atomic.  The ESP-IDF NVS API guarantees this
/// natively; the in-memory simulation achieves it trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored record is not a JSON object.
    Corrupted,
    /// A config field failed validation.
    ValidationFailed(&'static str),
    /// A string field exceeds its fixed capacity.
    TooLong(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
    /// Caller's buffer is smaller than the stored value.
    BufferTooSmall,
}

/// Errors from [`BusPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The network link below the bus is down.
    LinkDown,
    /// Broker refused or did not answer.
    ConnectFailed,
    NotConnected,
    SubscribeFailed,
    PublishFailed,
}

/// Errors from WiFi / portal bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    /// SSID empty, too long, or not printable ASCII.
    InvalidSsid,
    /// Passphrase neither empty (open network) nor 8..=64 bytes.
    InvalidPassword,
    NoCredentials,
    WifiConnectFailed,
    AccessPointFailed,
    HttpServerFailed,
}

/// Errors from [`UpdatePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    /// No inactive OTA partition available.
    NoPartition,
    BeginFailed,
    WriteFailed,
    /// Image failed verification or could not be marked bootable.
    FinalizeFailed,
    /// No update session is open.
    NotStarted,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::TooLong(field) => write!(f, "field '{}' too long", field),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
        }
    }
}

impl core::fmt::Display for BusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::LinkDown => write!(f, "network link down"),
            Self::ConnectFailed => write!(f, "broker connect failed"),
            Self::NotConnected => write!(f, "not connected"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
            Self::PublishFailed => write!(f, "publish failed"),
        }
    }
}

impl core::fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "invalid SSID"),
            Self::InvalidPassword => write!(f, "invalid WiFi password"),
            Self::NoCredentials => write!(f, "no WiFi credentials"),
            Self::WifiConnectFailed => write!(f, "WiFi connect failed"),
            Self::AccessPointFailed => write!(f, "access point start failed"),
            Self::HttpServerFailed => write!(f, "HTTP server start failed"),
        }
    }
}

impl core::fmt::Display for UpdateError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoPartition => write!(f, "no OTA partition"),
            Self::BeginFailed => write!(f, "OTA begin failed"),
            Self::WriteFailed => write!(f, "OTA write failed"),
            Self::FinalizeFailed => write!(f, "OTA finalize failed"),
            Self::NotStarted => write!(f, "no update in progress"),
        }
    }
}
