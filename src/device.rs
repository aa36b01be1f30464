//! Device identity reported to license authorities.
//!
//! The identifier is random, generated once and persisted; it only changes
//! after an explicit `reset`. The file is read on every call, so any number
//! of instances on one path report the same id. The name is the host name
//! when available.

use crate::LcpError;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Identity of this device as seen by license authorities.
pub trait DeviceIdentity: Send + Sync {
    /// Stable device identifier.
    fn device_id(&self) -> Result<String, LcpError>;

    /// Human-readable device name, or a fixed fallback.
    fn device_name(&self) -> String;

    /// Forget the identifier; the next `device_id` call creates a new one.
    fn reset(&self) -> Result<(), LcpError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DeviceRecord {
    id: String,
    created_at: DateTime<Utc>,
}

/// Device identity persisted as a small JSON file.
#[derive(Debug)]
pub struct StoredDeviceIdentity {
    path: PathBuf,
    fallback_name: String,
    lock: Mutex<()>,
    name: OnceCell<String>,
}

impl StoredDeviceIdentity {
    /// Identity stored at `path`, reporting `fallback_name` when the host
    /// name is unavailable.
    pub fn new(path: PathBuf, fallback_name: &str) -> Self {
        Self {
            path,
            fallback_name: fallback_name.to_string(),
            lock: Mutex::new(()),
            name: OnceCell::new(),
        }
    }

    fn load(&self) -> Result<Option<DeviceRecord>, LcpError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)
            .map_err(|e| LcpError::Device(format!("Failed to read device id: {}", e)))?;
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| LcpError::Device(format!("Failed to parse device id: {}", e)))
    }

    /// Publish `record` unless another writer got there first.
    ///
    /// Returns the record that ended up on disk.
    fn create(&self, record: DeviceRecord) -> Result<DeviceRecord, LcpError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| LcpError::Device(format!("Failed to create dir: {}", e)))?;
        }
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| LcpError::Device(format!("Failed to serialize: {}", e)))?;

        let temp_path = self.path.with_extension(format!("{}.tmp", record.id));
        fs::write(&temp_path, json)
            .map_err(|e| LcpError::Device(format!("Failed to write temp: {}", e)))?;

        // hard_link refuses to replace an existing id
        let linked = fs::hard_link(&temp_path, &self.path);
        let _ = fs::remove_file(&temp_path);
        match linked {
            Ok(()) => Ok(record),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => self
                .load()?
                .ok_or_else(|| LcpError::Device("Device id vanished".to_string())),
            Err(e) => Err(LcpError::Device(format!("Failed to publish device id: {}", e))),
        }
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, LcpError> {
        self.lock
            .lock()
            .map_err(|_| LcpError::Device("Device lock poisoned".to_string()))
    }
}

impl DeviceIdentity for StoredDeviceIdentity {
    fn device_id(&self) -> Result<String, LcpError> {
        let _guard = self.guard()?;

        let record = match self.load()? {
            Some(record) => record,
            None => self.create(DeviceRecord {
                id: Uuid::new_v4().to_string(),
                created_at: Utc::now(),
            })?,
        };
        Ok(record.id)
    }

    fn device_name(&self) -> String {
        self.name
            .get_or_init(|| {
                hostname::get()
                    .ok()
                    .and_then(|h| h.into_string().ok())
                    .filter(|h| !h.trim().is_empty())
                    .unwrap_or_else(|| self.fallback_name.clone())
            })
            .clone()
    }

    fn reset(&self) -> Result<(), LcpError> {
        let _guard = self.guard()?;
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|e| LcpError::Device(format!("Failed to delete device id: {}", e)))?;
        }
        Ok(())
    }
}
