//! Opaque decryption context and the decryption capability.

use crate::LcpError;
use std::fmt;

/// Key material unlocked for one license.
///
/// Produced by the certificate/crypto collaborator once a passphrase has
/// been accepted; the lifecycle only carries it to the decryption capability.
#[derive(Clone)]
pub struct DrmContext {
    license_id: String,
    material: Vec<u8>,
}

impl DrmContext {
    /// Wrap key material unlocked for `license_id`.
    pub fn new(license_id: impl Into<String>, material: Vec<u8>) -> Self {
        Self {
            license_id: license_id.into(),
            material,
        }
    }

    /// License this context was unlocked for.
    pub fn license_id(&self) -> &str {
        &self.license_id
    }

    /// Raw key material.
    pub fn material(&self) -> &[u8] {
        &self.material
    }
}

impl fmt::Debug for DrmContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrmContext")
            .field("license_id", &self.license_id)
            .field("material", &"<redacted>")
            .finish()
    }
}

/// Decryption primitive for protected resources.
pub trait Decipher: Send + Sync {
    /// Decrypt `data` with the given context.
    fn decrypt(&self, context: &DrmContext, data: &[u8]) -> Result<Vec<u8>, LcpError>;
}
