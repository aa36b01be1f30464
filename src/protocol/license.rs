//! The LCP license document.

use crate::protocol::{find_link, Link};
use crate::LcpError;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Rights granted by a license.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rights {
    /// Number of pages that may be printed.
    #[serde(default)]
    pub print: Option<u32>,

    /// Number of characters that may be copied.
    #[serde(default)]
    pub copy: Option<u32>,

    /// Rights are not exercisable before this instant.
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,

    /// Rights are not exercisable after this instant.
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,

    /// Latest end date a renewal may reach.
    #[serde(default)]
    pub potential_end: Option<DateTime<Utc>>,
}

impl Rights {
    /// Whether `now` falls inside `[start, end]`; absent bounds are open.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let started = self.start.map_or(true, |start| start <= now);
        let not_ended = self.end.map_or(true, |end| end >= now);
        started && not_ended
    }
}

/// The user a license was issued to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Provider-scoped user identifier.
    #[serde(default)]
    pub id: Option<String>,

    /// User email (may be encrypted, see `encrypted`).
    #[serde(default)]
    pub email: Option<String>,

    /// User name (may be encrypted, see `encrypted`).
    #[serde(default)]
    pub name: Option<String>,

    /// Names of the fields encrypted with the user key.
    #[serde(default)]
    pub encrypted: Vec<String>,
}

/// Content key protecting the publication resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentKey {
    /// Encryption algorithm URI.
    pub algorithm: String,
    /// Content key, encrypted with the user key (base64).
    pub encrypted_value: String,
}

/// User key derived from the user passphrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserKey {
    /// Hash algorithm URI.
    pub algorithm: String,
    /// Hint shown when asking the user for their passphrase.
    #[serde(default)]
    pub text_hint: String,
    /// License id encrypted with the user key (base64), used to test a passphrase.
    pub key_check: String,
}

/// Encryption parameters of a license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encryption {
    /// Encryption profile URI.
    pub profile: String,
    /// Content key block.
    pub content_key: ContentKey,
    /// User key block.
    pub user_key: UserKey,
}

/// Provider signature over the license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Signature algorithm URI.
    pub algorithm: String,
    /// Provider certificate (base64 DER).
    pub certificate: String,
    /// Signature value (base64).
    pub value: String,
}

#[derive(Debug, Deserialize)]
struct LicenseWire {
    id: String,
    issued: DateTime<Utc>,
    #[serde(default)]
    updated: Option<DateTime<Utc>>,
    provider: String,
    #[serde(default)]
    encryption: Option<Encryption>,
    #[serde(default)]
    links: Vec<Link>,
    #[serde(default)]
    rights: Option<Rights>,
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    signature: Option<Signature>,
}

/// A parsed license document together with the exact bytes it was parsed from.
///
/// The raw bytes are what gets embedded into publications, so the document
/// is never re-serialized.
#[derive(Debug, Clone)]
pub struct LicenseDocument {
    id: String,
    issued: DateTime<Utc>,
    updated: Option<DateTime<Utc>>,
    provider: Url,
    encryption: Option<Encryption>,
    links: Vec<Link>,
    rights: Option<Rights>,
    user: Option<User>,
    signature: Option<Signature>,
    raw: Vec<u8>,
}

impl LicenseDocument {
    /// Parse a license document.
    ///
    /// # Errors
    /// `MalformedDocument` when a required field is missing, a timestamp is
    /// not RFC 3339, or the provider is not a URL.
    pub fn parse(bytes: &[u8]) -> Result<Self, LcpError> {
        let wire: LicenseWire = serde_json::from_slice(bytes)
            .map_err(|e| LcpError::MalformedDocument(format!("License document: {}", e)))?;

        let provider = Url::parse(&wire.provider).map_err(|e| {
            LcpError::MalformedDocument(format!("Invalid provider '{}': {}", wire.provider, e))
        })?;

        Ok(Self {
            id: wire.id,
            issued: wire.issued,
            updated: wire.updated,
            provider,
            encryption: wire.encryption,
            links: wire.links,
            rights: wire.rights,
            user: wire.user,
            signature: wire.signature,
            raw: bytes.to_vec(),
        })
    }

    /// License identifier, stable across refreshes.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the provider issued the license.
    pub fn issued(&self) -> DateTime<Utc> {
        self.issued
    }

    /// When the provider last updated the license, if ever.
    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.updated
    }

    /// Last modification: `updated` if present, otherwise `issued`.
    pub fn date_of_last_update(&self) -> DateTime<Utc> {
        self.updated.unwrap_or(self.issued)
    }

    /// Provider that issued the license.
    pub fn provider(&self) -> &Url {
        &self.provider
    }

    /// Encryption parameters.
    pub fn encryption(&self) -> Option<&Encryption> {
        self.encryption.as_ref()
    }

    /// All links.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// First link with the given relation.
    pub fn link(&self, rel: &str) -> Option<&Link> {
        find_link(&self.links, rel)
    }

    /// Granted rights.
    pub fn rights(&self) -> Option<&Rights> {
        self.rights.as_ref()
    }

    /// License holder.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// License holder's identifier.
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.id.as_deref())
    }

    /// Provider signature block.
    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// Passphrase hint for the user, if the license carries one.
    pub fn text_hint(&self) -> Option<&str> {
        self.encryption
            .as_ref()
            .map(|e| e.user_key.text_hint.as_str())
            .filter(|hint| !hint.is_empty())
    }

    /// Exact bytes this document was parsed from.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{REL_PUBLICATION, REL_STATUS};
    use chrono::TimeZone;

    const FULL_LICENSE: &str = r#"{
        "id": "ef15e740-697f-11e3-949a-0800200c9a66",
        "issued": "2013-11-04T01:08:15+01:00",
        "updated": "2014-02-21T09:44:17+01:00",
        "provider": "https://www.imaginaryebookretailer.com",
        "encryption": {
            "profile": "http://readium.org/lcp/basic-profile",
            "content_key": {
                "algorithm": "http://www.w3.org/2001/04/xmlenc#aes256-cbc",
                "encrypted_value": "/k8RpXqf4E2WEunCp76E8PjhS051NXwAXeTD1ioazYxCRGvHLAck/KQ3cCh5JxDmCK0nRLyAxs1X0aA3z55boQ=="
            },
            "user_key": {
                "algorithm": "http://www.w3.org/2001/04/xmlenc#sha256",
                "text_hint": "Enter your email address",
                "key_check": "jJEjUDipHK3OjGt6kFq7dcOLZuicQFUYwQ+TYkAIWKm6Xv6kpHFhF7LOkUK/Owww"
            }
        },
        "links": [
            {"rel": "publication", "href": "https://www.example.com/file.epub", "type": "application/epub+zip", "length": 264336},
            {"rel": "status", "href": "https://www.example.com/status/ef15e740", "type": "application/vnd.readium.license.status.v1.0+json"}
        ],
        "rights": {
            "print": 10,
            "copy": 2048,
            "start": "2013-11-04T01:08:15+01:00",
            "end": "2013-11-25T01:08:15+01:00",
            "potentialEnd": "2014-11-25T01:08:15+01:00"
        },
        "user": {
            "id": "d9f298a7-7f34-49e7-8aae-4378ecb1d597",
            "email": "EnCt2b8c6d2afd94ae4ed201b27049d8ce1afe31a90ceb8c6d2afd94ae4ed201b2704RjkaXRveAAarHwdlID1KCIwEmS",
            "encrypted": ["email"]
        },
        "signature": {
            "algorithm": "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
            "certificate": "MIIDEjCCAfqgAwIBAgIBATANBgkqhkiG9w0BAQsFADBAMQswCQYDVQQGEwJVUzES",
            "value": "q/3IInic9c/EaJHyG1Kkqk5v1zlJNsiQBmxz4lykhyD3dA2jg2ZzrOenYU9GxP/xhe5H5Kt2WaJ/hnt8+GWrEx1QOwnNEij5CmIpZ63yRNKnFS5rSRnDMYmQT/fkUYco7BUi7MPPU6OFf4+kaToNWl8m/ZlMxDcS3BZnVhSEKzUNQn1f2y3sUcXjes7wHbImDc6dRthbL/E+assh5HEqakrDuA4lM8XNfukEYQJnivqhqMLOGM33RnS5nZKrPPK/c2F/vGjJffSrlX3W3Jlds0/MZ6wtVeKIugR06c56V6+qKsnMLAQJaeOxxBXmbFdAEyplP9irn4D9tQZKqbbMIw=="
        }
    }"#;

    const MINIMAL_LICENSE: &str = r#"{
        "id": "minimal-1",
        "issued": "2024-01-01T00:00:00Z",
        "provider": "https://provider.example.com"
    }"#;

    #[test]
    fn parse_full_license() {
        let license = LicenseDocument::parse(FULL_LICENSE.as_bytes()).unwrap();

        assert_eq!(license.id(), "ef15e740-697f-11e3-949a-0800200c9a66");
        assert_eq!(license.provider().as_str(), "https://www.imaginaryebookretailer.com/");
        assert_eq!(
            license.issued(),
            Utc.with_ymd_and_hms(2013, 11, 4, 0, 8, 15).unwrap()
        );
        assert_eq!(license.user_id(), Some("d9f298a7-7f34-49e7-8aae-4378ecb1d597"));
        assert_eq!(license.user().unwrap().encrypted, vec!["email"]);
        assert_eq!(license.text_hint(), Some("Enter your email address"));
        assert!(license.signature().is_some());

        let rights = license.rights().unwrap();
        assert_eq!(rights.print, Some(10));
        assert_eq!(rights.copy, Some(2048));
        assert!(rights.potential_end.is_some());

        let publication = license.link(REL_PUBLICATION).unwrap();
        assert_eq!(publication.length, Some(264336));
        assert!(license.link(REL_STATUS).is_some());
    }

    #[test]
    fn parse_minimal_license() {
        let license = LicenseDocument::parse(MINIMAL_LICENSE.as_bytes()).unwrap();
        assert!(license.rights().is_none());
        assert!(license.user_id().is_none());
        assert!(license.links().is_empty());
        assert!(license.text_hint().is_none());
        assert_eq!(license.date_of_last_update(), license.issued());
    }

    #[test]
    fn date_of_last_update_prefers_updated() {
        let license = LicenseDocument::parse(FULL_LICENSE.as_bytes()).unwrap();
        assert_eq!(
            license.date_of_last_update(),
            Utc.with_ymd_and_hms(2014, 2, 21, 8, 44, 17).unwrap()
        );
    }

    #[test]
    fn raw_bytes_are_preserved() {
        let license = LicenseDocument::parse(FULL_LICENSE.as_bytes()).unwrap();
        assert_eq!(license.as_bytes(), FULL_LICENSE.as_bytes());
    }

    #[test]
    fn missing_id_is_malformed() {
        let result = LicenseDocument::parse(
            br#"{"issued": "2024-01-01T00:00:00Z", "provider": "https://p.example.com"}"#,
        );
        assert!(matches!(result, Err(LcpError::MalformedDocument(_))));
    }

    #[test]
    fn bad_timestamp_is_malformed() {
        let result = LicenseDocument::parse(
            br#"{"id": "x", "issued": "yesterday", "provider": "https://p.example.com"}"#,
        );
        assert!(matches!(result, Err(LcpError::MalformedDocument(_))));
    }

    #[test]
    fn bad_provider_is_malformed() {
        let result = LicenseDocument::parse(
            br#"{"id": "x", "issued": "2024-01-01T00:00:00Z", "provider": "not a url"}"#,
        );
        assert!(matches!(result, Err(LcpError::MalformedDocument(_))));
    }

    #[test]
    fn not_json_is_malformed() {
        let result = LicenseDocument::parse(b"<license/>");
        assert!(matches!(result, Err(LcpError::MalformedDocument(_))));
    }

    #[test]
    fn rights_window_bounds() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let rights = Rights {
            start: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            end: Some(Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap()),
            ..Rights::default()
        };
        assert!(rights.contains(now));
        assert!(rights.contains(rights.start.unwrap()));
        assert!(rights.contains(rights.end.unwrap()));
        assert!(!rights.contains(Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap()));
        assert!(!rights.contains(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()));
        assert!(Rights::default().contains(now));
    }
}
