//! Over-the-air update adapter implementing [`UpdatePort`], backed by the
//! `esp-ota` crate.
//!
//! Flow: `begin_update` opens an HTTP listener → client POSTs the raw image
//! to `/update` → body is streamed into the inactive partition → finalize
//! marks it bootable → [`InboundEvent::UpdateFinished`] is queued for the
//! control loop.
//!
//! [`OtaSession`] holds the partition write state machine and is
//! host-testable; the HTTP plumbing only exists on ESP-IDF.

use core::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use log::{info, warn};

use crate::app::ports::{UpdateError, UpdatePort};
use crate::events::{push_inbound, InboundEvent};

#[cfg(target_os = "espidf")]
use esp_idf_svc::http::server::{Configuration as HttpConfiguration, EspHttpServer};
#[cfg(target_os = "espidf")]
use esp_idf_svc::http::Method;
#[cfg(target_os = "espidf")]
use esp_idf_svc::io::{Read, Write};

const MAX_FIRMWARE_SIZE: u32 = 4 * 1024 * 1024; // 4 MB

#[cfg(target_os = "espidf")]
const UPLOAD_CHUNK: usize = 4096;

// ── State machine ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaState {
    Idle,
    Receiving { bytes_written: u32 },
    Verifying,
    ReadyToReboot,
    Failed,
}

impl fmt::Display for OtaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Receiving { bytes_written } => write!(f, "receiving ({} bytes)", bytes_written),
            Self::Verifying => write!(f, "verifying"),
            Self::ReadyToReboot => write!(f, "ready to reboot"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Partition write session.
pub struct OtaSession {
    state: OtaState,
    #[cfg(target_os = "espidf")]
    ota_update: Option<esp_ota::OtaUpdate>,
}

impl OtaSession {
    pub fn new() -> Self {
        Self {
            state: OtaState::Idle,
            #[cfg(target_os = "espidf")]
            ota_update: None,
        }
    }

    pub fn state(&self) -> OtaState {
        self.state
    }

    /// True while image data is being written or verified.
    pub fn is_busy(&self) -> bool {
        matches!(self.state, OtaState::Receiving { .. } | OtaState::Verifying)
    }

    /// Open the inactive partition.  A failed or finished previous session
    /// is discarded.
    pub fn begin(&mut self) -> Result<(), UpdateError> {
        if self.is_busy() {
            return Err(UpdateError::BeginFailed);
        }

        #[cfg(target_os = "espidf")]
        {
            let update = esp_ota::OtaUpdate::begin().map_err(|e| {
                warn!("esp-ota begin failed: {:?}", e);
                UpdateError::NoPartition
            })?;
            self.ota_update = Some(update);
        }

        self.state = OtaState::Receiving { bytes_written: 0 };
        info!("OTA: session open");
        Ok(())
    }

    /// Append image bytes.  Returns the running total.
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<u32, UpdateError> {
        let OtaState::Receiving { bytes_written } = self.state else {
            return Err(UpdateError::NotStarted);
        };
        let total = bytes_written.saturating_add(data.len() as u32);
        if total > MAX_FIRMWARE_SIZE {
            self.fail();
            return Err(UpdateError::WriteFailed);
        }

        #[cfg(target_os = "espidf")]
        {
            let Some(update) = self.ota_update.as_mut() else {
                return Err(UpdateError::NotStarted);
            };
            if let Err(e) = update.write(data) {
                warn!("esp-ota write failed: {:?}", e);
                self.fail();
                return Err(UpdateError::WriteFailed);
            }
        }

        self.state = OtaState::Receiving { bytes_written: total };
        Ok(total)
    }

    /// Verify the image and mark its partition bootable.
    pub fn finalize(&mut self) -> Result<(), UpdateError> {
        match self.state {
            OtaState::Receiving { bytes_written } if bytes_written > 0 => {}
            OtaState::Receiving { .. } => {
                self.fail();
                return Err(UpdateError::FinalizeFailed);
            }
            _ => return Err(UpdateError::NotStarted),
        }
        self.state = OtaState::Verifying;

        #[cfg(target_os = "espidf")]
        {
            let Some(update) = self.ota_update.take() else {
                self.state = OtaState::Failed;
                return Err(UpdateError::NotStarted);
            };
            let mut completed = update.finalize().map_err(|e| {
                warn!("esp-ota finalize failed: {:?}", e);
                self.state = OtaState::Failed;
                UpdateError::FinalizeFailed
            })?;
            completed.set_as_boot_partition().map_err(|e| {
                warn!("esp-ota set_as_boot_partition failed: {:?}", e);
                self.state = OtaState::Failed;
                UpdateError::FinalizeFailed
            })?;
        }

        self.state = OtaState::ReadyToReboot;
        info!("OTA: image verified, ready to reboot");
        Ok(())
    }

    /// Drop any open session.  No-op when idle.
    pub fn abort(&mut self) {
        if self.state == OtaState::Idle {
            return;
        }
        // esp-ota aborts the partition write when OtaUpdate is dropped.
        #[cfg(target_os = "espidf")]
        self.ota_update.take();
        warn!("OTA: session aborted ({})", self.state);
        self.state = OtaState::Idle;
    }

    fn fail(&mut self) {
        #[cfg(target_os = "espidf")]
        self.ota_update.take();
        self.state = OtaState::Failed;
    }
}

impl Default for OtaSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a whole upload through `session` and report the outcome on the
/// inbound queue.  `next_chunk` yields body slices until `Ok(None)`.
pub fn receive_image<F>(session: &Mutex<OtaSession>, mut next_chunk: F) -> Result<u32, UpdateError>
where
    F: FnMut() -> Result<Option<Vec<u8>>, UpdateError>,
{
    let result = (|| {
        session.lock().unwrap_or_else(PoisonError::into_inner).begin()?;
        let mut total = 0;
        while let Some(chunk) = next_chunk()? {
            total = session
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .write_chunk(&chunk)?;
        }
        session.lock().unwrap_or_else(PoisonError::into_inner).finalize()?;
        Ok(total)
    })();

    if let Err(e) = result {
        warn!("OTA: upload failed: {}", e);
        session.lock().unwrap_or_else(PoisonError::into_inner).abort();
    }
    push_inbound(InboundEvent::UpdateFinished { ok: result.is_ok() });
    result
}

// ── Boot validation ───────────────────────────────────────────

/// Mark the running image valid so the bootloader cancels rollback.
#[cfg(target_os = "espidf")]
pub fn check_rollback() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: firmware marked valid (rollback cancelled)"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn check_rollback() {
    info!("OTA rollback check (simulation): skipped");
}

// ── UpdatePort ────────────────────────────────────────────────

pub struct UpdateServer {
    session: Arc<Mutex<OtaSession>>,
    #[cfg(target_os = "espidf")]
    server: Option<EspHttpServer<'static>>,
    #[cfg(not(target_os = "espidf"))]
    listening: bool,
}

impl UpdateServer {
    pub fn new() -> Self {
        Self {
            session: Arc::new(Mutex::new(OtaSession::new())),
            #[cfg(target_os = "espidf")]
            server: None,
            #[cfg(not(target_os = "espidf"))]
            listening: false,
        }
    }

    pub fn session(&self) -> Arc<Mutex<OtaSession>> {
        self.session.clone()
    }

    pub fn is_listening(&self) -> bool {
        #[cfg(target_os = "espidf")]
        {
            self.server.is_some()
        }
        #[cfg(not(target_os = "espidf"))]
        {
            self.listening
        }
    }
}

impl Default for UpdateServer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
impl UpdatePort for UpdateServer {
    fn begin_update(&mut self) -> Result<(), UpdateError> {
        if self.server.is_some() {
            return Ok(());
        }
        let conf = HttpConfiguration {
            stack_size: 10 * 1024,
            ..Default::default()
        };
        let mut server = EspHttpServer::new(&conf).map_err(|_| UpdateError::BeginFailed)?;
        let session = self.session.clone();
        server
            .fn_handler::<anyhow::Error, _>("/update", Method::Post, move |mut req| {
                let mut buf = vec![0u8; UPLOAD_CHUNK];
                let outcome = receive_image(&session, || {
                    let n = req.read(&mut buf).map_err(|_| UpdateError::WriteFailed)?;
                    Ok((n > 0).then(|| buf[..n].to_vec()))
                });
                match outcome {
                    Ok(total) => {
                        let msg = format!("ok {} bytes\n", total);
                        req.into_ok_response()?.write_all(msg.as_bytes())?;
                    }
                    Err(e) => {
                        let msg = format!("{}\n", e);
                        req.into_status_response(500)?.write_all(msg.as_bytes())?;
                    }
                }
                Ok(())
            })
            .map_err(|_| UpdateError::BeginFailed)?;
        self.server = Some(server);
        info!("OTA: listening on /update");
        Ok(())
    }

    fn abort_update(&mut self) {
        self.server = None;
        self.session.lock().unwrap_or_else(PoisonError::into_inner).abort();
    }

    fn update_busy(&self) -> bool {
        self.session.lock().unwrap_or_else(PoisonError::into_inner).is_busy()
    }
}

#[cfg(not(target_os = "espidf"))]
impl UpdatePort for UpdateServer {
    fn begin_update(&mut self) -> Result<(), UpdateError> {
        self.listening = true;
        info!("OTA(sim): listening");
        Ok(())
    }

    fn abort_update(&mut self) {
        self.listening = false;
        self.session.lock().unwrap_or_else(PoisonError::into_inner).abort();
    }

    fn update_busy(&self) -> bool {
        self.session.lock().unwrap_or_else(PoisonError::into_inner).is_busy()
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_requires_open_session() {
        let mut ota = OtaSession::new();
        assert_eq!(ota.write_chunk(b"data"), Err(UpdateError::NotStarted));
        assert_eq!(ota.finalize(), Err(UpdateError::NotStarted));
    }

    #[test]
    fn begin_while_receiving_is_refused() {
        let mut ota = OtaSession::new();
        ota.begin().unwrap();
        assert!(ota.is_busy());
        assert_eq!(ota.begin(), Err(UpdateError::BeginFailed));
    }

    #[test]
    fn empty_image_fails_finalize() {
        let mut ota = OtaSession::new();
        ota.begin().unwrap();
        assert_eq!(ota.finalize(), Err(UpdateError::FinalizeFailed));
        assert_eq!(ota.state(), OtaState::Failed);
        assert!(!ota.is_busy());
    }

    #[test]
    fn oversized_image_fails() {
        let mut ota = OtaSession::new();
        ota.begin().unwrap();
        let big = vec![0u8; (MAX_FIRMWARE_SIZE + 1) as usize];
        assert_eq!(ota.write_chunk(&big), Err(UpdateError::WriteFailed));
        assert_eq!(ota.state(), OtaState::Failed);
    }

    #[test]
    fn happy_path_multi_chunk() {
        let mut ota = OtaSession::new();
        ota.begin().unwrap();
        assert_eq!(ota.write_chunk(b"abcd").unwrap(), 4);
        assert_eq!(ota.write_chunk(b"efgh").unwrap(), 8);
        ota.finalize().unwrap();
        assert_eq!(ota.state(), OtaState::ReadyToReboot);
    }

    #[test]
    fn abort_resets_to_idle() {
        let mut server = UpdateServer::new();
        server.begin_update().unwrap();
        server.session().lock().unwrap().begin().unwrap();
        assert!(server.update_busy());

        server.abort_update();
        assert!(!server.is_listening());
        assert!(!server.update_busy());
        assert_eq!(server.session().lock().unwrap().state(), OtaState::Idle);
    }

    #[test]
    fn receive_image_reports_outcome() {
        let _guard = crate::events::TEST_QUEUE_LOCK.lock().unwrap();
        crate::events::drain_inbound();

        let session = Mutex::new(OtaSession::new());
        let mut chunks = vec![b"img1".to_vec(), b"img2".to_vec()].into_iter();
        assert_eq!(receive_image(&session, || Ok(chunks.next())), Ok(8));

        let failed = Mutex::new(OtaSession::new());
        assert_eq!(
            receive_image(&failed, || Err(UpdateError::WriteFailed)),
            Err(UpdateError::WriteFailed)
        );
        assert_eq!(failed.lock().unwrap().state(), OtaState::Idle);

        let events = crate::events::drain_inbound();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], InboundEvent::UpdateFinished { ok: true }));
        assert!(matches!(events[1], InboundEvent::UpdateFinished { ok: false }));
    }
}
