//! Status gate: terminal license states can never be bypassed.

use crate::protocol::status::{LicenseStatus, StatusDocument};
use crate::LcpError;

/// Check that the authority still considers the license usable.
///
/// # Returns
/// * `Ok(())` - status is `ready` or `active`
/// * `Err(MissingLicenseStatus)` - no status document is held
/// * `Err(LicenseReturned | LicenseExpired | LicenseRevoked | LicenseCancelled)`
pub fn check_status(status: Option<&StatusDocument>) -> Result<(), LcpError> {
    let status = status.ok_or(LcpError::MissingLicenseStatus)?;

    match status.status() {
        LicenseStatus::Returned => Err(LcpError::LicenseReturned),
        LicenseStatus::Expired => Err(LcpError::LicenseExpired),
        LicenseStatus::Revoked => Err(LcpError::LicenseRevoked),
        LicenseStatus::Cancelled => Err(LcpError::LicenseCancelled),
        LicenseStatus::Active | LicenseStatus::Ready => Ok(()),
    }
}
