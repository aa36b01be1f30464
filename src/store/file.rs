//! Transaction store with atomic file persistence.
//!
//! Stores the snapshot at `dirs::data_dir()/<namespace>/transactions.json`.
//! The file is the source of truth: reads load it, writes reload it under
//! the lock, apply the change, persist with a unique temp file + rename,
//! and only then publish it in memory. Several handles on one directory
//! therefore see each other's rows.

use crate::store::format::{LicenseStateRecord, StoreSnapshot, TransactionRecord};
use crate::LcpError;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use uuid::Uuid;

const STORE_FILE: &str = "transactions.json";

/// Persisted passphrase and license-state bookkeeping.
///
/// Shared by every controller of a process (wrap it in an `Arc`). Passphrase
/// rows are never deleted here.
#[derive(Debug)]
pub struct TransactionStore {
    /// Snapshot file, or `None` for a memory-only store.
    path: Option<PathBuf>,
    snapshot: RwLock<StoreSnapshot>,
}

impl TransactionStore {
    /// Open (or create) the store in the given directory.
    pub fn open(dir: &Path) -> Result<Self, LcpError> {
        fs::create_dir_all(dir)
            .map_err(|e| LcpError::Store(format!("Failed to create store dir: {}", e)))?;

        let path = dir.join(STORE_FILE);
        let snapshot = load(&path)?;

        Ok(Self {
            path: Some(path),
            snapshot: RwLock::new(snapshot),
        })
    }

    /// Store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            snapshot: RwLock::new(StoreSnapshot::default()),
        }
    }

    /// Append a passphrase discovery.
    pub fn record_passphrase(
        &self,
        license_id: &str,
        provider: &str,
        user_id: Option<&str>,
        passphrase_hash: &str,
    ) -> Result<(), LcpError> {
        self.write(|snapshot| {
            snapshot.transactions.push(TransactionRecord {
                license_id: license_id.to_string(),
                provider: provider.to_string(),
                user_id: user_id.map(String::from),
                passphrase_hash: passphrase_hash.to_string(),
            });
        })
    }

    /// Every hash recorded for this user, in insertion order.
    pub fn passphrases_for_user(&self, user_id: &str) -> Result<Vec<String>, LcpError> {
        let snapshot = self.read()?;
        Ok(snapshot
            .transactions
            .iter()
            .filter(|t| t.user_id.as_deref() == Some(user_id))
            .map(|t| t.passphrase_hash.clone())
            .collect())
    }

    /// Most recently recorded hash for exactly this license.
    pub fn passphrase_for_license(&self, license_id: &str) -> Result<Option<String>, LcpError> {
        let snapshot = self.read()?;
        Ok(snapshot
            .transactions
            .iter()
            .rev()
            .find(|t| t.license_id == license_id)
            .map(|t| t.passphrase_hash.clone()))
    }

    /// Candidate hashes to try for a license, user matches first.
    ///
    /// The per-license match is appended after the per-user matches and
    /// duplicates keep their first position.
    pub fn possible_passphrases(
        &self,
        license_id: &str,
        user_id: Option<&str>,
    ) -> Result<Vec<String>, LcpError> {
        let mut candidates = match user_id {
            Some(user_id) => self.passphrases_for_user(user_id)?,
            None => Vec::new(),
        };
        if let Some(hash) = self.passphrase_for_license(license_id)? {
            candidates.push(hash);
        }

        let mut unique = Vec::with_capacity(candidates.len());
        for hash in candidates {
            if !unique.contains(&hash) {
                unique.push(hash);
            }
        }
        Ok(unique)
    }

    /// Whether this license has been seen before.
    pub fn is_known_license(&self, license_id: &str) -> Result<bool, LcpError> {
        Ok(self.read()?.licenses.contains_key(license_id))
    }

    /// Timestamp of the license copy held locally.
    pub fn last_known_update(&self, license_id: &str) -> Result<Option<DateTime<Utc>>, LcpError> {
        Ok(self
            .read()?
            .licenses
            .get(license_id)
            .map(|record| record.last_update))
    }

    /// Last status string the authority returned for this license.
    pub fn last_known_status(&self, license_id: &str) -> Result<Option<String>, LcpError> {
        Ok(self
            .read()?
            .licenses
            .get(license_id)
            .map(|record| record.status.clone()))
    }

    /// Overwrite the state record of a license.
    pub fn record_state(
        &self,
        license_id: &str,
        last_update: DateTime<Utc>,
        status: &str,
    ) -> Result<(), LcpError> {
        self.write(|snapshot| {
            snapshot.licenses.insert(
                license_id.to_string(),
                LicenseStateRecord {
                    last_update,
                    status: status.to_string(),
                },
            );
        })
    }

    /// Replace the status of a license, keeping its stored timestamp.
    ///
    /// `fallback_update` is used when the license has no record yet.
    pub fn update_status(
        &self,
        license_id: &str,
        status: &str,
        fallback_update: DateTime<Utc>,
    ) -> Result<(), LcpError> {
        self.write(|snapshot| {
            let last_update = snapshot
                .licenses
                .get(license_id)
                .map_or(fallback_update, |record| record.last_update);
            snapshot.licenses.insert(
                license_id.to_string(),
                LicenseStateRecord {
                    last_update,
                    status: status.to_string(),
                },
            );
        })
    }

    fn read(&self) -> Result<StoreSnapshot, LcpError> {
        let guard = self
            .snapshot
            .read()
            .map_err(|_| LcpError::Store("Store lock poisoned".to_string()))?;
        match &self.path {
            Some(path) => load(path),
            None => Ok(guard.clone()),
        }
    }

    /// Apply a change, persist it, then publish it.
    fn write(&self, change: impl FnOnce(&mut StoreSnapshot)) -> Result<(), LcpError> {
        let mut guard = self
            .snapshot
            .write()
            .map_err(|_| LcpError::Store("Store lock poisoned".to_string()))?;

        let mut next = match &self.path {
            Some(path) => load(path)?,
            None => guard.clone(),
        };
        change(&mut next);
        if let Some(path) = &self.path {
            save(path, &next)?;
        }
        *guard = next;
        Ok(())
    }
}

fn load(path: &Path) -> Result<StoreSnapshot, LcpError> {
    if !path.exists() {
        return Ok(StoreSnapshot::default());
    }
    let json = fs::read_to_string(path)
        .map_err(|e| LcpError::Store(format!("Failed to read store: {}", e)))?;
    StoreSnapshot::from_json(&json)
}

fn save(path: &Path, snapshot: &StoreSnapshot) -> Result<(), LcpError> {
    let json = snapshot.to_json()?;
    let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4()));

    fs::write(&temp_path, &json)
        .map_err(|e| LcpError::Store(format!("Failed to write temp file: {}", e)))?;
    fs::rename(&temp_path, path)
        .map_err(|e| LcpError::Store(format!("Failed to rename store file: {}", e)))?;

    Ok(())
}
