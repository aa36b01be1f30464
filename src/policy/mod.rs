//! Gating checks applied by the lifecycle pipeline.

pub mod rights;
pub mod status;

pub use rights::validate_rights;
pub use status::check_status;
