//! Transport and remote service client for license authorities.

pub mod http;
pub mod service;

#[cfg(test)]
pub(crate) mod fake;

pub use http::{HttpTransport, SubmitMethod, Transport, TransportResponse};
pub use service::LcpService;
