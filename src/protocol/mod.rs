//! LCP license and status document models.
//!
//! Both documents are immutable once parsed: a refresh produces a new value
//! that replaces the old one, it never patches it.

pub mod license;
pub mod status;

use serde::{Deserialize, Serialize};

/// Link relation of the status document inside a license.
pub const REL_STATUS: &str = "status";
/// Link relation of the protected publication inside a license.
pub const REL_PUBLICATION: &str = "publication";
/// Link relation of the fresh license inside a status document.
pub const REL_LICENSE: &str = "license";
/// Link relation of the device registration endpoint.
pub const REL_REGISTER: &str = "register";
/// Link relation of the loan renewal endpoint.
pub const REL_RENEW: &str = "renew";
/// Link relation of the loan return endpoint.
pub const REL_RETURN: &str = "return";

/// A typed link carried by a license or status document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Relation name (e.g. "status", "publication").
    pub rel: String,

    /// Target URL, possibly templated (e.g. `.../register{?id,name}`).
    pub href: String,

    /// Media type of the target.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    /// Human-readable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Size of the target in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,

    /// Hash of the target (base64 SHA-256 in LCP).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    /// Whether `href` is a URI template.
    #[serde(default)]
    pub templated: bool,
}

/// First link with the given relation, if any.
pub(crate) fn find_link<'a>(links: &'a [Link], rel: &str) -> Option<&'a Link> {
    links.iter().find(|link| link.rel == rel)
}
