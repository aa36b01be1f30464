//! Durable passphrase and license-state storage.

pub mod file;
pub mod format;

pub use file::TransactionStore;
