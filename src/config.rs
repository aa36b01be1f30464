//! Lifecycle configuration.

use crate::LcpError;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for license lifecycle management.
///
/// Holds the product-specific settings used to talk to license authorities
/// and to locate local state.
#[derive(Debug, Clone)]
pub struct LcpConfig {
    /// Application name and version (e.g., "reader/2.1.0").
    pub app_name: &'static str,

    /// User-Agent product identifier sent to license authorities.
    pub user_agent_product: &'static str,

    /// Namespace for local state.
    /// Transactions, device identity and downloaded publications are stored
    /// under `dirs::data_dir()/<namespace>/`.
    pub storage_namespace: &'static str,

    /// Device name reported when the host name cannot be determined.
    pub device_name_fallback: &'static str,

    /// Transport timeout for every request to a license authority.
    pub request_timeout: Duration,
}

impl LcpConfig {
    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), LcpError> {
        if self.storage_namespace.is_empty() {
            return Err(LcpError::Config(
                "storage_namespace cannot be empty".to_string(),
            ));
        }
        if self.user_agent_product.is_empty() {
            return Err(LcpError::Config(
                "user_agent_product cannot be empty".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(LcpError::Config(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Root directory for this namespace's local state.
    pub fn storage_dir(&self) -> Result<PathBuf, LcpError> {
        let base_dir = dirs::data_dir()
            .ok_or_else(|| LcpError::Config("Could not find data directory".to_string()))?;
        Ok(base_dir.join(self.storage_namespace))
    }
}
