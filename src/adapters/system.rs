//! Device-level collaborators bundled behind one value: the WiFi radio,
//! the configuration portal, the update listener, and system restart.
//!
//! Implements [`PortalPort`], [`UpdatePort`], and [`SystemPort`] for the
//! control loop.  Entering the portal switches the radio to soft-AP mode.

use log::warn;

use crate::adapters::ota::UpdateServer;
use crate::adapters::portal::PortalServer;
use crate::adapters::wifi::WifiAdapter;
use crate::app::ports::{ConnectivityError, PortalPort, SystemPort, UpdateError, UpdatePort};
use crate::config::ShortString;

pub struct DeviceServices {
    wifi: WifiAdapter,
    portal: PortalServer,
    update: UpdateServer,
    ap_ssid: ShortString,
    #[cfg(not(target_os = "espidf"))]
    restarts: u32,
}

impl DeviceServices {
    pub fn new(wifi: WifiAdapter, ap_ssid: ShortString) -> Self {
        Self {
            wifi,
            portal: PortalServer::new(),
            update: UpdateServer::new(),
            ap_ssid,
            #[cfg(not(target_os = "espidf"))]
            restarts: 0,
        }
    }

    pub fn wifi(&self) -> &WifiAdapter {
        &self.wifi
    }

    pub fn wifi_mut(&mut self) -> &mut WifiAdapter {
        &mut self.wifi
    }

    pub fn portal(&self) -> &PortalServer {
        &self.portal
    }

    pub fn update(&self) -> &UpdateServer {
        &self.update
    }

    /// Simulation: number of restart requests seen.
    #[cfg(not(target_os = "espidf"))]
    pub fn restarts(&self) -> u32 {
        self.restarts
    }
}

impl PortalPort for DeviceServices {
    fn start_portal(&mut self) -> Result<(), ConnectivityError> {
        self.wifi.start_access_point(&self.ap_ssid)?;
        self.portal.start()
    }

    fn stop_portal(&mut self) {
        self.portal.stop();
    }

    fn portal_busy(&self) -> bool {
        self.portal.is_busy()
    }
}

impl UpdatePort for DeviceServices {
    fn begin_update(&mut self) -> Result<(), UpdateError> {
        self.update.begin_update()
    }

    fn abort_update(&mut self) {
        self.update.abort_update();
    }

    fn update_busy(&self) -> bool {
        self.update.update_busy()
    }
}

impl SystemPort for DeviceServices {
    #[cfg(target_os = "espidf")]
    fn restart(&mut self) {
        warn!("system: restarting");
        // SAFETY: esp_restart never returns.
        unsafe { esp_idf_svc::sys::esp_restart() };
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self) {
        warn!("system(sim): restart requested");
        self.restarts += 1;
    }
}
