//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] and [`StoragePort`].  The device configuration
//! lives in one blob (`duorelay::devcfg`) holding the flat JSON key/value
//! record produced by [`DeviceConfig::to_record_bytes`].
//!
//! - Validation: [`DeviceConfig::validate`] runs before every save.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//! - Simulation: a `HashMap` behind a `RefCell` on host targets.

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::DeviceConfig;
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

pub const CONFIG_NAMESPACE: &str = "duorelay";
pub const CONFIG_KEY: &str = "devcfg";

/// Upper bound on the stored record.
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.  A partition that is full or from a newer
    /// IDF version is erased and re-initialised.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS use.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// Read a whole blob.  `Ok(None)` when the key does not exist.
    fn get_blob(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            Ok(self.store.borrow().get(&Self::composite_key(namespace, key)).cloned())
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = c_name(key);
            let result = with_nvs_handle(namespace, false, |handle| {
                let mut size: usize = 0;
                let ret = unsafe {
                    nvs_get_blob(handle, key_buf.as_ptr() as *const _, core::ptr::null_mut(), &mut size)
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                if size > MAX_BLOB_SIZE {
                    return Err(ESP_ERR_NVS_INVALID_LENGTH);
                }
                let mut buf = vec![0u8; size];
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                buf.truncate(size);
                Ok(buf)
            });
            match result {
                Ok(buf) => Ok(Some(buf)),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
                Err(e) => {
                    warn!("NvsAdapter: read {}::{} failed ({})", namespace, key, e);
                    Err(StorageError::IoError)
                }
            }
        }
    }

    fn set_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_BLOB_SIZE {
            return Err(StorageError::Full);
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(Self::composite_key(namespace, key), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = c_name(key);
            let result = with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        data.as_ptr() as *const _,
                        data.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|e| {
                warn!("NvsAdapter: write {}::{} failed ({})", namespace, key, e);
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }
}

/// NUL-terminated NVS name (namespace and key names are at most 15 bytes).
#[cfg(target_os = "espidf")]
fn c_name(s: &str) -> [u8; 16] {
    let mut buf = [0u8; 16];
    let bytes = s.as_bytes();
    let len = bytes.len().min(15);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

/// Open an NVS namespace, run `f` with the handle, then close it.
#[cfg(target_os = "espidf")]
fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
where
    F: FnOnce(nvs_handle_t) -> Result<T, i32>,
{
    let ns_buf = c_name(namespace);
    let mut handle: nvs_handle_t = 0;
    let mode = if write {
        nvs_open_mode_t_NVS_READWRITE
    } else {
        nvs_open_mode_t_NVS_READONLY
    };

    let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
    if ret != ESP_OK {
        return Err(ret);
    }
    let result = f(handle);
    unsafe {
        nvs_close(handle);
    }
    result
}

// ── ConfigPort ────────────────────────────────────────────────

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        let bytes = self
            .get_blob(CONFIG_NAMESPACE, CONFIG_KEY)
            .map_err(|_| ConfigError::IoError)?
            .ok_or(ConfigError::NotFound)?;
        let (cfg, fallbacks) = DeviceConfig::from_record_bytes(&bytes)?;
        if fallbacks > 0 {
            warn!("NvsAdapter: {} config field(s) fell back to defaults", fallbacks);
        }
        info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = config.to_record_bytes()?;
        self.set_blob(CONFIG_NAMESPACE, CONFIG_KEY, &bytes)
            .map_err(|e| match e {
                StorageError::Full => ConfigError::StorageFull,
                _ => ConfigError::IoError,
            })?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

// ── StoragePort ───────────────────────────────────────────────

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let data = self.get_blob(namespace, key)?.ok_or(StorageError::NotFound)?;
        if data.len() > buf.len() {
            return Err(StorageError::BufferTooSmall);
        }
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.set_blob(namespace, key, data)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .remove(&Self::composite_key(namespace, key));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = c_name(key);
            let result = with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe { nvs_erase_key(handle, key_buf.as_ptr() as *const _) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|_| StorageError::IoError)
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        matches!(self.get_blob(namespace, key), Ok(Some(_)))
    }
}
