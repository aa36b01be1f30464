//! Persisted record shapes of the transaction store.
//!
//! The whole store is one JSON snapshot:
//! - `transactions`: append-only passphrase discoveries
//! - `licenses`: last known update timestamp and status per license

use crate::LcpError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One passphrase discovery. Many rows may reference the same license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// License the passphrase unlocked.
    pub license_id: String,

    /// Provider that issued the license.
    pub provider: String,

    /// License holder, when the license names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// SHA-256 hash of the passphrase (hex).
    pub passphrase_hash: String,
}

/// Last known state of one license, overwritten on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseStateRecord {
    /// Authority timestamp of the license copy held locally.
    pub last_update: DateTime<Utc>,

    /// Last status string returned by the authority.
    pub status: String,
}

/// Everything the store persists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Passphrase rows in insertion order.
    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,

    /// License state keyed by license id.
    #[serde(default)]
    pub licenses: BTreeMap<String, LicenseStateRecord>,
}

impl StoreSnapshot {
    /// Serialize the snapshot to JSON.
    pub fn to_json(&self) -> Result<String, LcpError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LcpError::Store(format!("Failed to serialize store: {}", e)))
    }

    /// Deserialize a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, LcpError> {
        serde_json::from_str(json)
            .map_err(|e| LcpError::Store(format!("Failed to deserialize store: {}", e)))
    }
}
