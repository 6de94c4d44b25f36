//! Configuration portal HTTP server.
//!
//! Serves a bare form on `/` and accepts a JSON [`ConfigUpdate`] on
//! `POST /save`.  A valid submission is queued as
//! [`InboundEvent::PortalSaved`]; merging, validation, and persistence
//! happen in the control loop.
//!
//! The number of handlers still writing a response is tracked so the
//! restart that follows a save waits for the reply to leave the socket.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{info, warn};

use crate::app::ports::ConnectivityError;
use crate::config::ConfigUpdate;
use crate::events::{push_inbound, InboundEvent};

#[cfg(target_os = "espidf")]
use esp_idf_svc::http::server::{Configuration as HttpConfiguration, EspHttpServer};
#[cfg(target_os = "espidf")]
use esp_idf_svc::http::Method;
#[cfg(target_os = "espidf")]
use esp_idf_svc::io::{Read, Write};

/// Largest accepted form body.
pub const MAX_FORM_BODY: usize = 1024;

#[cfg(target_os = "espidf")]
const INDEX_HTML: &str = r#"<!doctype html><html><body><h3>DuoRelay setup</h3>
<textarea id="c" rows="14" cols="48">{"wifi_ssid":"","wifi_pass":"","mqtt_server":"","mqtt_port":"1883"}</textarea>
<br><button onclick="fetch('/save',{method:'POST',body:document.getElementById('c').value}).then(r=>r.text()).then(alert)">Save</button>
</body></html>"#;

/// Why a submission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormError {
    TooLarge,
    Malformed,
    QueueFull,
}

impl core::fmt::Display for FormError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TooLarge => write!(f, "form body too large"),
            Self::Malformed => write!(f, "form body is not a valid settings object"),
            Self::QueueFull => write!(f, "device busy, try again"),
        }
    }
}

/// Decode a submitted form and queue it for the control loop.
pub fn accept_form(body: &[u8]) -> Result<(), FormError> {
    if body.len() > MAX_FORM_BODY {
        return Err(FormError::TooLarge);
    }
    let update: ConfigUpdate = serde_json::from_slice(body).map_err(|e| {
        warn!("portal: bad form body: {}", e);
        FormError::Malformed
    })?;
    if !push_inbound(InboundEvent::PortalSaved(update)) {
        return Err(FormError::QueueFull);
    }
    info!("portal: settings submitted");
    Ok(())
}

/// Status code and body for a `POST /save` outcome.  Acceptance only means
/// the form was queued; the control loop may still reject the settings.
pub fn save_reply(result: Result<(), FormError>) -> (u16, String) {
    match result {
        Ok(()) => (202, "settings submitted, restart follows if they are valid\n".into()),
        Err(e) => (400, format!("{}\n", e)),
    }
}

/// Decrements the in-flight counter on drop.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

pub struct PortalServer {
    in_flight: Arc<AtomicUsize>,
    #[cfg(target_os = "espidf")]
    server: Option<EspHttpServer<'static>>,
    #[cfg(not(target_os = "espidf"))]
    running: bool,
}

impl PortalServer {
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(AtomicUsize::new(0)),
            #[cfg(target_os = "espidf")]
            server: None,
            #[cfg(not(target_os = "espidf"))]
            running: false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0
    }

    #[cfg(target_os = "espidf")]
    pub fn is_running(&self) -> bool {
        self.server.is_some()
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[cfg(target_os = "espidf")]
    pub fn start(&mut self) -> Result<(), ConnectivityError> {
        if self.server.is_some() {
            return Ok(());
        }
        let conf = HttpConfiguration {
            stack_size: 10 * 1024,
            ..Default::default()
        };
        let mut server = EspHttpServer::new(&conf).map_err(|_| ConnectivityError::HttpServerFailed)?;

        server
            .fn_handler::<anyhow::Error, _>("/", Method::Get, |req| {
                req.into_ok_response()?.write_all(INDEX_HTML.as_bytes())?;
                Ok(())
            })
            .map_err(|_| ConnectivityError::HttpServerFailed)?;

        let in_flight = self.in_flight.clone();
        server
            .fn_handler::<anyhow::Error, _>("/save", Method::Post, move |mut req| {
                let _guard = InFlight::enter(&in_flight);
                let mut body = Vec::new();
                let mut chunk = [0u8; 256];
                loop {
                    let n = req.read(&mut chunk)?;
                    if n == 0 {
                        break;
                    }
                    body.extend_from_slice(&chunk[..n]);
                    if body.len() > MAX_FORM_BODY {
                        break;
                    }
                }
                let (status, reply) = save_reply(accept_form(&body));
                req.into_status_response(status)?.write_all(reply.as_bytes())?;
                Ok(())
            })
            .map_err(|_| ConnectivityError::HttpServerFailed)?;

        self.server = Some(server);
        info!("portal: HTTP server up");
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn start(&mut self) -> Result<(), ConnectivityError> {
        self.running = true;
        info!("portal(sim): HTTP server up");
        Ok(())
    }

    pub fn stop(&mut self) {
        #[cfg(target_os = "espidf")]
        {
            self.server = None;
        }
        #[cfg(not(target_os = "espidf"))]
        {
            self.running = false;
        }
        info!("portal: HTTP server stopped");
    }

    /// Simulation: run a submission through the same path as `POST /save`.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_submit(&self, body: &[u8]) -> Result<(), FormError> {
        let _guard = InFlight::enter(&self.in_flight);
        accept_form(body)
    }
}

impl Default for PortalServer {
    fn default() -> Self {
        Self::new()
    }
}
