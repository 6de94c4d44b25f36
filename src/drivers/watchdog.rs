//! Task Watchdog Timer (TWDT) driver.
//!
//! Subscribes the control-loop task to the ESP-IDF TWDT.  A loop that
//! stops calling [`Watchdog::feed`] for longer than the timeout panics and
//! reboots the board, which also de-energizes both relays.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::{info, warn};

/// Default stall budget for the control loop.
pub const DEFAULT_TIMEOUT_MS: u32 = 10_000;

pub struct Watchdog {
    timeout_ms: u32,
    subscribed: bool,
    feeds: u64,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS)
    }
}

impl Watchdog {
    pub fn new(timeout_ms: u32) -> Self {
        let subscribed = Self::subscribe(timeout_ms);
        Self {
            timeout_ms,
            subscribed,
            feeds: 0,
        }
    }

    #[cfg(target_os = "espidf")]
    fn subscribe(timeout_ms: u32) -> bool {
        let cfg = esp_task_wdt_config_t {
            timeout_ms,
            idle_core_mask: 0,
            trigger_panic: true,
        };
        // SAFETY: plain FFI calls on the current task; cfg outlives the call.
        let ret = unsafe { esp_task_wdt_reconfigure(&cfg) };
        if ret != ESP_OK {
            warn!("Watchdog: reconfigure returned {} (may already be configured)", ret);
        }
        let ret = unsafe { esp_task_wdt_add(core::ptr::null_mut()) };
        if ret != ESP_OK {
            warn!("Watchdog: failed to subscribe ({})", ret);
            return false;
        }
        info!("Watchdog: subscribed ({} ms timeout, panic on trigger)", timeout_ms);
        true
    }

    #[cfg(not(target_os = "espidf"))]
    fn subscribe(timeout_ms: u32) -> bool {
        if timeout_ms == 0 {
            warn!("Watchdog(sim): zero timeout, not subscribing");
            return false;
        }
        info!("Watchdog(sim): {} ms timeout", timeout_ms);
        true
    }

    /// Feed the watchdog.  Call once per control cycle.
    pub fn feed(&mut self) {
        if !self.subscribed {
            return;
        }
        #[cfg(target_os = "espidf")]
        // SAFETY: the current task was added in `subscribe`.
        unsafe {
            esp_task_wdt_reset();
        }
        self.feeds += 1;
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn feeds(&self) -> u64 {
        self.feeds
    }
}
