//! Reqwest-based transport to license authorities.
//!
//! The transport only moves bytes: it performs no retries and knows nothing
//! about LCP documents. Timeouts are configured here, not in the lifecycle.

use crate::config::LcpConfig;
use crate::LcpError;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use reqwest::Method;
use std::fs::{self, File};
use std::path::Path;

/// HTTP verb used to submit a form to a license authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMethod {
    /// Device registration.
    Post,
    /// Renewal and return.
    Put,
}

impl SubmitMethod {
    fn as_method(self) -> Method {
        match self {
            SubmitMethod::Post => Method::POST,
            SubmitMethod::Put => Method::PUT,
        }
    }
}

/// Response to a submitted form.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,

    /// Raw response body.
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Get the body as a UTF-8 string.
    pub fn body_str(&self) -> Result<&str, LcpError> {
        std::str::from_utf8(&self.body)
            .map_err(|e| LcpError::Transport(format!("Invalid UTF-8 in body: {}", e)))
    }
}

/// Byte-level access to remote license authorities.
pub trait Transport: Send + Sync {
    /// GET a resource; non-success statuses are failures.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, LcpError>;

    /// Stream a resource to `destination`, returning the number of bytes written.
    fn download(&self, url: &str, destination: &Path) -> Result<u64, LcpError>;

    /// Submit query parameters with the given verb.
    fn submit(
        &self,
        method: SubmitMethod,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<TransportResponse, LcpError>;
}

/// Blocking HTTP transport.
pub struct HttpTransport {
    client: Client,
    user_agent: String,
}

impl HttpTransport {
    /// Create a transport from config.
    pub fn new(config: &LcpConfig) -> Result<Self, LcpError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LcpError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            user_agent: build_user_agent(config),
        })
    }

    /// User-Agent sent with every request.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, LcpError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| LcpError::Transport(format!("GET {} failed: {}", url, e)))?;

        let body = response
            .bytes()
            .map_err(|e| LcpError::Transport(format!("Failed to read body: {}", e)))?;
        Ok(body.to_vec())
    }

    fn download(&self, url: &str, destination: &Path) -> Result<u64, LcpError> {
        let mut response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| LcpError::Transport(format!("GET {} failed: {}", url, e)))?;

        let mut file = File::create(destination)
            .map_err(|e| LcpError::Transport(format!("Failed to create download: {}", e)))?;

        match response.copy_to(&mut file) {
            Ok(written) => Ok(written),
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(destination);
                Err(LcpError::Transport(format!("Download of {} interrupted: {}", url, e)))
            }
        }
    }

    fn submit(
        &self,
        method: SubmitMethod,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<TransportResponse, LcpError> {
        let response = self
            .client
            .request(method.as_method(), url)
            .header(USER_AGENT, &self.user_agent)
            .query(params)
            .send()
            .map_err(|e| LcpError::Transport(format!("{:?} {} failed: {}", method, url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| LcpError::Transport(format!("Failed to read body: {}", e)))?
            .to_vec();

        Ok(TransportResponse { status, body })
    }
}

/// Build a User-Agent string from config.
///
/// Format: `<product>/lcp-lifecycle-<version> <app>`
pub fn build_user_agent(config: &LcpConfig) -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        "{}/lcp-lifecycle-{} {}",
        config.user_agent_product, version, config.app_name
    )
}
