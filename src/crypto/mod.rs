//! Passphrase hashing and the decryption seam.

pub mod context;
pub mod digest;

pub use context::{Decipher, DrmContext};
pub use digest::hash_passphrase;
