//! WiFi adapter: station mode for normal operation, soft-AP for the
//! configuration portal.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## Reconnection policy
//!
//! On disconnect the adapter waits an exponential backoff (2 s, 4 s, 8 s,
//! capped at 60 s) before retrying.  The bus adapter watches the shared
//! [`LinkStatus`] and refuses to open a broker session while it is down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};

use crate::app::ports::ConnectivityError;
use crate::config::WifiCredentials;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi,
};

// ───────────────────────────────────────────────────────────────
// Link status shared with the bus adapter
// ───────────────────────────────────────────────────────────────

/// Cheap clonable flag: `true` while the station has an IP link.
#[derive(Debug, Clone, Default)]
pub struct LinkStatus(Arc<AtomicBool>);

impl LinkStatus {
    pub fn is_up(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, up: bool) {
        self.0.store(up, Ordering::Release);
    }
}

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Idle,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    AccessPoint,
}

const INITIAL_BACKOFF_MS: u64 = 2_000;
const MAX_BACKOFF_MS: u64 = 60_000;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    credentials: Option<WifiCredentials>,
    backoff_ms: u64,
    next_attempt_ms: u64,
    link: LinkStatus,

    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,

    #[cfg(not(target_os = "espidf"))]
    sim_link_up: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_reachable: bool,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: EspWifi<'static>) -> Self {
        Self {
            state: WifiState::Idle,
            credentials: None,
            backoff_ms: INITIAL_BACKOFF_MS,
            next_attempt_ms: 0,
            link: LinkStatus::default(),
            wifi,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            state: WifiState::Idle,
            credentials: None,
            backoff_ms: INITIAL_BACKOFF_MS,
            next_attempt_ms: 0,
            link: LinkStatus::default(),
            sim_link_up: false,
            sim_reachable: true,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn link_status(&self) -> LinkStatus {
        self.link.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state == WifiState::Connected
    }

    pub fn set_credentials(&mut self, credentials: &WifiCredentials) -> Result<(), ConnectivityError> {
        validate_ssid(&credentials.ssid)?;
        validate_password(&credentials.password)?;
        self.credentials = Some(credentials.clone());
        Ok(())
    }

    /// Configure station mode and issue the first association attempt.
    /// Does not wait for the link; [`poll`](Self::poll) tracks progress.
    pub fn start_station(&mut self, now_ms: u64) -> Result<(), ConnectivityError> {
        let creds = self.credentials.clone().ok_or(ConnectivityError::NoCredentials)?;
        self.platform_start_station(&creds)?;
        info!("WiFi: connecting to '{}'", creds.ssid);
        self.state = WifiState::Connecting;
        self.backoff_ms = INITIAL_BACKOFF_MS;
        self.next_attempt_ms = now_ms + self.backoff_ms;
        Ok(())
    }

    /// Switch to an open soft-AP named `ssid`.  Station mode is dropped.
    pub fn start_access_point(&mut self, ssid: &str) -> Result<(), ConnectivityError> {
        self.link.set(false);
        self.platform_start_ap(ssid)?;
        self.state = WifiState::AccessPoint;
        info!("WiFi: access point '{}' up", ssid);
        Ok(())
    }

    /// Track association and retry with backoff.  Call once per cycle.
    pub fn poll(&mut self, now_ms: u64) {
        let up = self.platform_link_up();
        match self.state {
            WifiState::Idle | WifiState::AccessPoint => {}
            WifiState::Connecting | WifiState::Reconnecting { .. } if up => {
                info!("WiFi: connected");
                self.state = WifiState::Connected;
                self.backoff_ms = INITIAL_BACKOFF_MS;
            }
            WifiState::Connecting => {
                if now_ms >= self.next_attempt_ms {
                    self.state = WifiState::Reconnecting { attempt: 1 };
                    self.retry(now_ms);
                }
            }
            WifiState::Reconnecting { attempt } => {
                if now_ms >= self.next_attempt_ms {
                    self.state = WifiState::Reconnecting { attempt: attempt + 1 };
                    self.retry(now_ms);
                }
            }
            WifiState::Connected => {
                if !up {
                    warn!("WiFi: link lost, retry in {} ms", self.backoff_ms);
                    self.state = WifiState::Reconnecting { attempt: 0 };
                    self.next_attempt_ms = now_ms + self.backoff_ms;
                }
            }
        }
        self.link.set(self.state == WifiState::Connected);
    }

    fn retry(&mut self, now_ms: u64) {
        if let WifiState::Reconnecting { attempt } = self.state {
            info!("WiFi: reconnect attempt {} (backoff {} ms)", attempt, self.backoff_ms);
        }
        if let Err(e) = self.platform_connect() {
            warn!("WiFi: {}", e);
        }
        self.backoff_ms = (self.backoff_ms * 2).min(MAX_BACKOFF_MS);
        self.next_attempt_ms = now_ms + self.backoff_ms;
    }

    // ── Platform: ESP-IDF ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start_station(&mut self, creds: &WifiCredentials) -> Result<(), ConnectivityError> {
        let auth_method = if creds.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let ssid = creds.ssid.as_str().try_into().map_err(|_| ConnectivityError::InvalidSsid)?;
        let password = creds
            .password
            .as_str()
            .try_into()
            .map_err(|_| ConnectivityError::InvalidPassword)?;
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid,
                password,
                auth_method,
                ..Default::default()
            }))
            .map_err(|_| ConnectivityError::WifiConnectFailed)?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|_| ConnectivityError::WifiConnectFailed)?;
        }
        self.platform_connect()
    }

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        self.wifi.connect().map_err(|_| ConnectivityError::WifiConnectFailed)
    }

    #[cfg(target_os = "espidf")]
    fn platform_link_up(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.is_up().unwrap_or(false)
    }

    #[cfg(target_os = "espidf")]
    fn platform_start_ap(&mut self, ssid: &str) -> Result<(), ConnectivityError> {
        let ssid = ssid.try_into().map_err(|_| ConnectivityError::InvalidSsid)?;
        if self.wifi.is_started().unwrap_or(false) {
            let _ = self.wifi.stop();
        }
        self.wifi
            .set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
                ssid,
                auth_method: AuthMethod::None,
                channel: 1,
                max_connections: 4,
                ..Default::default()
            }))
            .map_err(|_| ConnectivityError::AccessPointFailed)?;
        self.wifi.start().map_err(|_| ConnectivityError::AccessPointFailed)
    }

    // ── Platform: simulation ──────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn platform_start_station(&mut self, _creds: &WifiCredentials) -> Result<(), ConnectivityError> {
        self.platform_connect()
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        self.sim_link_up = self.sim_reachable;
        if self.sim_link_up {
            Ok(())
        } else {
            Err(ConnectivityError::WifiConnectFailed)
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_link_up(&self) -> bool {
        self.sim_link_up
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start_ap(&mut self, _ssid: &str) -> Result<(), ConnectivityError> {
        self.sim_link_up = false;
        Ok(())
    }

    /// Simulation: make the access point (un)reachable.  Going unreachable
    /// also drops the current link.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_reachable(&mut self, reachable: bool) {
        self.sim_reachable = reachable;
        if !reachable {
            self.sim_link_up = false;
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}
