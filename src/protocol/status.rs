//! The License Status Document served by a license authority.

use crate::protocol::{find_link, Link};
use crate::LcpError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Current state of a license as known by its authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    /// Issued, not yet registered by any device.
    Ready,
    /// Registered by at least one device.
    Active,
    /// Revoked by the provider.
    Revoked,
    /// Returned by the user.
    Returned,
    /// Cancelled before first use.
    Cancelled,
    /// Past its end date.
    Expired,
}

impl LicenseStatus {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Ready => "ready",
            LicenseStatus::Active => "active",
            LicenseStatus::Revoked => "revoked",
            LicenseStatus::Returned => "returned",
            LicenseStatus::Cancelled => "cancelled",
            LicenseStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseStatus {
    type Err = LcpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(LicenseStatus::Ready),
            "active" => Ok(LicenseStatus::Active),
            "revoked" => Ok(LicenseStatus::Revoked),
            "returned" => Ok(LicenseStatus::Returned),
            "cancelled" => Ok(LicenseStatus::Cancelled),
            "expired" => Ok(LicenseStatus::Expired),
            other => Err(LcpError::MalformedDocument(format!(
                "Unknown license status '{}'",
                other
            ))),
        }
    }
}

/// Update timestamps of a status document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Updated {
    /// Last time the authority changed the license itself.
    pub license: DateTime<Utc>,
    /// Last time the authority changed the status.
    pub status: DateTime<Utc>,
}

/// Extension limit for a loan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotentialRights {
    /// Latest end date a renewal may reach.
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

/// A registration, renewal or return recorded by the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event type (register, renew, return, revoke, cancel).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Name of the device that caused the event.
    #[serde(default)]
    pub name: Option<String>,
    /// Identifier of the device that caused the event.
    #[serde(default)]
    pub id: Option<String>,
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct StatusWire {
    #[serde(default)]
    id: Option<String>,
    status: LicenseStatus,
    #[serde(default)]
    message: Option<String>,
    updated: Updated,
    #[serde(default)]
    links: Vec<Link>,
    #[serde(default)]
    potential_rights: Option<PotentialRights>,
    #[serde(default)]
    events: Vec<Event>,
}

/// A parsed status document. Refetched on every evaluation, never patched.
#[derive(Debug, Clone)]
pub struct StatusDocument {
    id: Option<String>,
    status: LicenseStatus,
    message: Option<String>,
    updated: Updated,
    links: Vec<Link>,
    potential_rights: Option<PotentialRights>,
    events: Vec<Event>,
}

impl StatusDocument {
    /// Parse a status document.
    ///
    /// # Errors
    /// `MalformedDocument` on an unknown status value, a missing `updated`
    /// block, or an unparseable timestamp.
    pub fn parse(bytes: &[u8]) -> Result<Self, LcpError> {
        let wire: StatusWire = serde_json::from_slice(bytes)
            .map_err(|e| LcpError::MalformedDocument(format!("Status document: {}", e)))?;

        Ok(Self {
            id: wire.id,
            status: wire.status,
            message: wire.message,
            updated: wire.updated,
            links: wire.links,
            potential_rights: wire.potential_rights,
            events: wire.events,
        })
    }

    /// Identifier of the license this status describes.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Current status.
    pub fn status(&self) -> LicenseStatus {
        self.status
    }

    /// Human-readable message from the authority.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Update timestamps.
    pub fn updated(&self) -> &Updated {
        &self.updated
    }

    /// All links.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// First link with the given relation.
    pub fn link(&self, rel: &str) -> Option<&Link> {
        find_link(&self.links, rel)
    }

    /// Renewal ceiling.
    pub fn potential_rights(&self) -> Option<&PotentialRights> {
        self.potential_rights.as_ref()
    }

    /// Event history.
    pub fn events(&self) -> &[Event] {
        &self.events
    }
}
