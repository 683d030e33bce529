//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`StoragePort`] for the settings record and the command
//! offset.  Everything lives in one namespace; each record is a single
//! blob, and ESP-IDF commits are atomic per `nvs_commit()`, so a power cut
//! never leaves a torn record.
//!
//! On non-espidf targets the adapter is an in-memory map, which is what
//! the simulation binary and host tests use.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{StorageError, StoragePort};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// NVS namespace holding every camwatch record.
pub const NAMESPACE: &str = "camwatch";

#[cfg(target_os = "espidf")]
const NVS_OK: esp_err_t = ESP_OK as esp_err_t;

/// NVS key names are limited to 15 bytes plus the terminator.
const KEY_MAX: usize = 15;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
    #[cfg(not(target_os = "espidf"))]
    fail_writes: bool,
}

impl NvsAdapter {
    /// Initialise NVS flash.
    ///
    /// On first boot or after a layout version change the partition is
    /// erased and re-initialised.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != NVS_OK {
                    return Err(StorageError::IoError);
                }
                if unsafe { nvs_flash_init() } != NVS_OK {
                    return Err(StorageError::IoError);
                }
            } else if ret != NVS_OK {
                return Err(StorageError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised (namespace '{}')", NAMESPACE);
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
            #[cfg(not(target_os = "espidf"))]
            fail_writes: false,
        })
    }

    /// Simulation only: make every subsequent write fail with `IoError`.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// NUL-terminated key, truncated to what NVS accepts.
    fn key_buf(key: &str) -> [u8; KEY_MAX + 1] {
        let mut buf = [0u8; KEY_MAX + 1];
        let bytes = key.as_bytes();
        let len = bytes.len().min(KEY_MAX);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    #[cfg(not(target_os = "espidf"))]
    fn sim_key(key: &str) -> String {
        let buf = Self::key_buf(key);
        let len = buf.iter().position(|&b| b == 0).unwrap_or(KEY_MAX);
        String::from_utf8_lossy(&buf[..len]).into_owned()
    }

    /// Open the namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::key_buf(NAMESPACE);
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let mut handle: nvs_handle_t = 0;
        let ret = unsafe { nvs_open(ns.as_ptr().cast(), mode, &mut handle) };
        if ret != NVS_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let key = Self::sim_key(key);
            match self.store.borrow().get(&key) {
                Some(data) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(len)
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::key_buf(key);
            let result = Self::with_nvs_handle(false, |handle| {
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key.as_ptr().cast(),
                        buf.as_mut_ptr().cast(),
                        &mut size,
                    )
                };
                if ret != NVS_OK {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(size),
                // A namespace that was never written cannot be opened read-only.
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND as esp_err_t => Err(StorageError::NotFound),
                Err(e) => {
                    warn!("NvsAdapter: read error {}", e);
                    Err(StorageError::IoError)
                }
            }
        }
    }

    fn write(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            if self.fail_writes {
                return Err(StorageError::IoError);
            }
            let key = Self::sim_key(key);
            self.store.borrow_mut().insert(key, data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::key_buf(key);
            let result = Self::with_nvs_handle(true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(handle, key.as_ptr().cast(), data.as_ptr().cast(), data.len())
                };
                if ret != NVS_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != NVS_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|e| {
                warn!("NvsAdapter: write error {}", e);
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE as esp_err_t {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }
}
