//! Remote service client for license authorities.
//!
//! Turns transport bytes into parsed documents and status strings. Every
//! operation is idempotent and performs no retries; the caller decides
//! whether a failure aborts or is swallowed.

use crate::client::http::{SubmitMethod, Transport, TransportResponse};
use crate::protocol::license::LicenseDocument;
use crate::protocol::status::{LicenseStatus, StatusDocument};
use crate::LcpError;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Client for status, license, publication and device endpoints.
#[derive(Clone)]
pub struct LcpService {
    transport: Arc<dyn Transport>,
    downloads_dir: PathBuf,
}

impl LcpService {
    /// Create a service downloading publications into `downloads_dir`.
    pub fn new(transport: Arc<dyn Transport>, downloads_dir: PathBuf) -> Self {
        Self {
            transport,
            downloads_dir,
        }
    }

    /// Directory receiving downloaded publications.
    pub fn downloads_dir(&self) -> &PathBuf {
        &self.downloads_dir
    }

    /// Fetch and parse a status document.
    pub fn fetch_status_document(&self, url: &str) -> Result<StatusDocument, LcpError> {
        debug!(url, "fetching status document");
        let body = self.transport.fetch(url)?;
        StatusDocument::parse(&body)
    }

    /// Fetch and parse a license document.
    pub fn fetch_license_document(&self, url: &str) -> Result<LicenseDocument, LcpError> {
        debug!(url, "fetching license document");
        let body = self.transport.fetch(url)?;
        LicenseDocument::parse(&body)
    }

    /// Stream a publication to a freshly named file and return its path.
    pub fn download_publication(&self, url: &str) -> Result<PathBuf, LcpError> {
        fs::create_dir_all(&self.downloads_dir).map_err(|e| {
            LcpError::Transport(format!("Failed to create downloads dir: {}", e))
        })?;

        let destination = self.downloads_dir.join(Uuid::new_v4().to_string());
        let written = self.transport.download(url, &destination)?;
        info!(url, path = %destination.display(), bytes = written, "publication downloaded");
        Ok(destination)
    }

    /// Register this device for the license.
    pub fn register(
        &self,
        url: &str,
        device_id: &str,
        device_name: &str,
    ) -> Result<LicenseStatus, LcpError> {
        let params = [("id", device_id.to_string()), ("name", device_name.to_string())];
        let response = self.transport.submit(SubmitMethod::Post, url, &params)?;
        parse_submit_response(url, &response)
    }

    /// Extend the loan, optionally up to `end`.
    pub fn renew(
        &self,
        url: &str,
        device_id: &str,
        device_name: &str,
        end: Option<DateTime<Utc>>,
    ) -> Result<LicenseStatus, LcpError> {
        let mut params = Vec::with_capacity(3);
        if let Some(end) = end {
            params.push(("end", end.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        params.push(("id", device_id.to_string()));
        params.push(("name", device_name.to_string()));

        let response = self.transport.submit(SubmitMethod::Put, url, &params)?;
        parse_submit_response(url, &response)
    }

    /// Return the loan from this device.
    pub fn return_license(
        &self,
        url: &str,
        device_id: &str,
        device_name: &str,
    ) -> Result<LicenseStatus, LcpError> {
        let params = [("id", device_id.to_string()), ("name", device_name.to_string())];
        let response = self.transport.submit(SubmitMethod::Put, url, &params)?;
        parse_submit_response(url, &response)
    }

    /// Fetch a DER certificate revocation list and return it PEM-armored.
    pub fn fetch_certificate_revocation_list(&self, url: &str) -> Result<String, LcpError> {
        debug!(url, "fetching certificate revocation list");
        let der = self.transport.fetch(url)?;
        Ok(format!(
            "-----BEGIN X509 CRL-----{}-----END X509 CRL-----",
            STANDARD.encode(der)
        ))
    }
}

/// Extract the `status` field of a successful submit response.
fn parse_submit_response(url: &str, response: &TransportResponse) -> Result<LicenseStatus, LcpError> {
    if response.status != 200 {
        return Err(LcpError::Transport(format!(
            "{} returned HTTP {}",
            url, response.status
        )));
    }

    let json: serde_json::Value = serde_json::from_str(response.body_str()?)
        .map_err(|e| LcpError::Transport(format!("Invalid response from {}: {}", url, e)))?;

    json.get("status")
        .and_then(|s| s.as_str())
        .ok_or_else(|| LcpError::Transport(format!("No status in response from {}", url)))?
        .parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeTransport;
    use chrono::TimeZone;
    use tempfile::TempDir;

    const STATUS_URL: &str = "https://lsd.example.com/licenses/L1/status";
    const REGISTER_URL: &str = "https://lsd.example.com/licenses/L1/register";

    fn service(transport: Arc<FakeTransport>, dir: &TempDir) -> LcpService {
        LcpService::new(transport, dir.path().join("publications"))
    }

    #[test]
    fn fetch_status_document_parses() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(FakeTransport::default());
        transport.serve(
            STATUS_URL,
            r#"{"status": "ready", "updated": {"license": "2025-01-01T00:00:00Z", "status": "2025-01-02T00:00:00Z"}}"#,
        );

        let status = service(transport, &dir).fetch_status_document(STATUS_URL).unwrap();
        assert_eq!(status.status(), LicenseStatus::Ready);
    }

    #[test]
    fn fetch_failure_is_transport_error() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(FakeTransport::default());

        let result = service(transport, &dir).fetch_status_document(STATUS_URL);
        assert!(matches!(result, Err(LcpError::Transport(_))));
    }

    #[test]
    fn fetch_garbage_is_malformed() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(FakeTransport::default());
        transport.serve(STATUS_URL, "<html>maintenance</html>");

        let result = service(transport, &dir).fetch_status_document(STATUS_URL);
        assert!(matches!(result, Err(LcpError::MalformedDocument(_))));
    }

    #[test]
    fn download_uses_fresh_names() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(FakeTransport::default());
        transport.serve("https://cdn.example.com/book.epub", b"epub-bytes".to_vec());
        let service = service(transport, &dir);

        let first = service.download_publication("https://cdn.example.com/book.epub").unwrap();
        let second = service.download_publication("https://cdn.example.com/book.epub").unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with(dir.path().join("publications")));
        assert_eq!(fs::read(&first).unwrap(), b"epub-bytes");
    }

    #[test]
    fn register_returns_status() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(FakeTransport::default());
        transport.respond(REGISTER_URL, 200, r#"{"id": "L1", "status": "active"}"#);

        let status = service(Arc::clone(&transport), &dir)
            .register(REGISTER_URL, "device-1", "Laptop")
            .unwrap();
        assert_eq!(status, LicenseStatus::Active);

        let submissions = transport.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].method, SubmitMethod::Post);
        assert_eq!(
            submissions[0].params,
            vec![
                ("id".to_string(), "device-1".to_string()),
                ("name".to_string(), "Laptop".to_string())
            ]
        );
    }

    #[test]
    fn register_rejected_is_transport_error() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(FakeTransport::default());
        transport.respond(REGISTER_URL, 400, r#"{"title": "device already registered"}"#);

        let result = service(transport, &dir).register(REGISTER_URL, "device-1", "Laptop");
        assert!(matches!(result, Err(LcpError::Transport(_))));
    }

    #[test]
    fn response_without_status_is_transport_error() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(FakeTransport::default());
        transport.respond(REGISTER_URL, 200, r#"{"id": "L1"}"#);

        let result = service(transport, &dir).register(REGISTER_URL, "device-1", "Laptop");
        assert!(matches!(result, Err(LcpError::Transport(_))));
    }

    #[test]
    fn renew_sends_end_date_first() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(FakeTransport::default());
        let url = "https://lsd.example.com/licenses/L1/renew";
        transport.respond(url, 200, r#"{"status": "active"}"#);
        let end = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();

        let service = service(Arc::clone(&transport), &dir);
        service.renew(url, "device-1", "Laptop", Some(end)).unwrap();
        service.renew(url, "device-1", "Laptop", None).unwrap();

        let submissions = transport.submissions();
        assert_eq!(submissions[0].method, SubmitMethod::Put);
        assert_eq!(
            submissions[0].params[0],
            ("end".to_string(), "2025-03-01T00:00:00Z".to_string())
        );
        assert_eq!(submissions[1].params.len(), 2);
    }

    #[test]
    fn crl_is_pem_armored() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(FakeTransport::default());
        transport.serve("https://crl.example.com/root.crl", vec![0x30, 0x82, 0x01]);

        let pem = service(transport, &dir)
            .fetch_certificate_revocation_list("https://crl.example.com/root.crl")
            .unwrap();
        assert_eq!(pem, "-----BEGIN X509 CRL-----MIIB-----END X509 CRL-----");
    }
}
