//! # lcp-lifecycle
//!
//! **Client-side lifecycle management for LCP-protected publications.**
//!
//! Given a license document, `lcp-lifecycle` asks the license authority
//! whether the license is still honored, refreshes the local copy when a
//! newer one exists, enforces the rights window, registers the device and
//! produces a publication file carrying the current license.
//!
//! ## Features
//!
//! - **Status gate** - returned, expired, revoked and cancelled licenses are rejected
//! - **Idempotent refresh** - a license is fetched only when the authority's copy is newer
//! - **Rights window** - `start`/`end` checked against an injectable clock
//! - **Best-effort device calls** - register, renew and return never abort a run
//! - **Transaction store** - remembered passphrase hashes and per-license state
//!
//! ## Quickstart
//!
//! ```no_run
//! use lcp_lifecycle::{Decipher, DrmContext, LcpConfig, LcpError, LicenseController, LicenseEnvironment};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Engine;
//!
//! impl Decipher for Engine {
//!     fn decrypt(&self, _context: &DrmContext, data: &[u8]) -> Result<Vec<u8>, LcpError> {
//!         Ok(data.to_vec())
//!     }
//! }
//!
//! fn main() -> Result<(), LcpError> {
//!     let config = LcpConfig {
//!         app_name: "reader/2.1.0",
//!         user_agent_product: "reader-lcp",
//!         storage_namespace: "reader-lcp",
//!         device_name_fallback: "Unknown Device",
//!         request_timeout: Duration::from_secs(30),
//!     };
//!
//!     let env = LicenseEnvironment::new(&config, Arc::new(Engine))?;
//!     let mut controller = LicenseController::from_license_file("book.lcpl".as_ref(), env)?;
//!
//!     if let Some(path) = controller.evaluate()?.path() {
//!         println!("publication ready at {}", path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! Gating steps (status fetch, status check, license refresh, rights) abort
//! with a typed [`LcpError`]; [`LcpError::is_retryable`] separates network
//! trouble from final verdicts. Certificate chain and signature validation
//! are out of scope and belong to the decryption engine.

#![warn(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Document layer
pub mod protocol;

// Local state
pub mod device;
pub mod store;

// Remote layer
pub mod client;

// Publication and decryption seams
pub mod container;
pub mod crypto;

// Policy layer
pub mod policy;

// Controller (main public API)
pub mod controller;

// Re-exports for public API
pub use client::{HttpTransport, LcpService, SubmitMethod, Transport, TransportResponse};
pub use clock::{Clock, SystemClock};
pub use config::LcpConfig;
pub use container::{PublicationContainer, ZipContainer, LICENSE_ENTRY};
pub use controller::{
    Evaluation, LicenseController, LicenseEnvironment, LifecycleState, SkipReason, StepOutcome,
};
pub use crypto::{hash_passphrase, Decipher, DrmContext};
pub use device::{DeviceIdentity, StoredDeviceIdentity};
pub use errors::LcpError;
pub use protocol::license::{LicenseDocument, Rights};
pub use protocol::status::{LicenseStatus, StatusDocument};
pub use protocol::Link;
pub use store::TransactionStore;

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
