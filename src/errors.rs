//! License lifecycle error types.

use thiserror::Error;

/// Errors that can occur while managing a protected publication's license.
#[derive(Debug, Error)]
pub enum LcpError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A license or status document could not be parsed.
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// Transport failure talking to the license authority.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The status document could not be fetched.
    #[error("License status unavailable: {0}")]
    StatusUnavailable(String),

    /// A fresher license was announced but could not be fetched.
    #[error("License update failed: {0}")]
    LicenseUpdateFailed(String),

    /// A status check was requested but no status document is held.
    #[error("Missing license status")]
    MissingLicenseStatus,

    /// The rights window does not include the current time.
    #[error("License rights are not valid at this time")]
    InvalidRights,

    /// The license was returned by the user.
    #[error("License has been returned")]
    LicenseReturned,

    /// The license expired.
    #[error("License has expired")]
    LicenseExpired,

    /// The license was revoked by the provider.
    #[error("License has been revoked")]
    LicenseRevoked,

    /// The license was cancelled before use.
    #[error("License has been cancelled")]
    LicenseCancelled,

    /// Decryption was attempted before a context was established.
    #[error("Invalid decryption context")]
    InvalidContext,

    /// The decryption capability rejected the input.
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// The publication container could not be read or written.
    #[error("Archive error: {0}")]
    Archive(String),

    /// The publication container has no entry with the requested name.
    #[error("File not found in archive: {0}")]
    FileNotInArchive(String),

    /// A standalone license file could not be read.
    #[error("License file error: {0}")]
    LicenseFile(String),

    /// Transaction store I/O error.
    #[error("Store error: {0}")]
    Store(String),

    /// Device identity could not be read or persisted.
    #[error("Device identity error: {0}")]
    Device(String),
}

impl LcpError {
    /// Whether rerunning the whole evaluation later may succeed.
    ///
    /// Business-rule rejections (returned, revoked, invalid rights, ...) are
    /// final; only transport failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LcpError::Transport(_) | LcpError::StatusUnavailable(_) | LcpError::LicenseUpdateFailed(_)
        )
    }
}
