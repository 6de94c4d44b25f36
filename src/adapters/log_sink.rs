//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production).

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { online } => {
                info!("START | online={}", online);
            }
            AppEvent::ModeChanged { from, to } => {
                info!("MODE  | {:?} -> {:?}", from, to);
            }
            AppEvent::RequestRejected { request, mode } => {
                warn!("MODE  | {:?} rejected in {:?}", request, mode);
            }
            AppEvent::RelayChanged { relay, energized } => {
                info!("RELAY | {} {}", relay, if *energized { "ON" } else { "OFF" });
            }
            AppEvent::StatusPublished { relay, payload } => {
                debug!("BUS   | {} status '{}'", relay, payload);
            }
            AppEvent::StatusDropped { relay } => {
                debug!("BUS   | {} status dropped (bus down)", relay);
            }
            AppEvent::BusConnected => {
                info!("BUS   | connected");
            }
            AppEvent::BusConnectFailed { error, retry_in_ms } => {
                warn!("BUS   | connect failed: {} (retry in {} ms)", error, retry_in_ms);
            }
            AppEvent::ConfigRejected => {
                warn!("CFG   | portal submission rejected");
            }
            AppEvent::RestartRequested(reason) => {
                info!("MODE  | restart requested: {:?}", reason);
            }
        }
    }
}
