//! SHA-256 passphrase hashing.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of `data`, hex-encoded.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hash a user passphrase the way LCP user keys are derived.
///
/// Only this hash is ever stored; the clear passphrase is not kept.
pub fn hash_passphrase(passphrase: &str) -> String {
    sha256_hex(passphrase.as_bytes())
}
