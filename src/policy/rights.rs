//! Rights window enforcement.

use crate::protocol::license::Rights;
use crate::LcpError;
use chrono::{DateTime, Utc};

/// Check that the license rights are exercisable at `now`.
///
/// # Returns
/// * `Ok(())` - `now` is inside `[start, end]`, or the bound is absent
/// * `Err(InvalidRights)` - `start` is after `now` or `end` is before `now`
pub fn validate_rights(rights: Option<&Rights>, now: DateTime<Utc>) -> Result<(), LcpError> {
    let Some(rights) = rights else {
        return Ok(());
    };

    if rights.start.is_some_and(|start| start > now) {
        return Err(LcpError::InvalidRights);
    }
    if rights.end.is_some_and(|end| end < now) {
        return Err(LcpError::InvalidRights);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn window(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Rights {
        Rights {
            start,
            end,
            ..Rights::default()
        }
    }

    #[test]
    fn no_rights_block_is_unbounded() {
        assert!(validate_rights(None, now()).is_ok());
        assert!(validate_rights(Some(&Rights::default()), now()).is_ok());
    }

    #[test]
    fn inside_window_is_valid() {
        let rights = window(Some(now() - Duration::days(1)), Some(now() + Duration::days(1)));
        assert!(validate_rights(Some(&rights), now()).is_ok());
    }

    #[test]
    fn bounds_are_inclusive() {
        let rights = window(Some(now()), Some(now()));
        assert!(validate_rights(Some(&rights), now()).is_ok());
    }

    #[test]
    fn not_yet_started_is_invalid() {
        let rights = window(Some(now() + Duration::seconds(1)), None);
        assert!(matches!(
            validate_rights(Some(&rights), now()),
            Err(LcpError::InvalidRights)
        ));
    }

    #[test]
    fn ended_is_invalid() {
        let rights = window(None, Some(now() - Duration::seconds(1)));
        assert!(matches!(
            validate_rights(Some(&rights), now()),
            Err(LcpError::InvalidRights)
        ));
    }

    #[test]
    fn open_ended_sides() {
        let started = window(Some(now() - Duration::days(365)), None);
        let ending = window(None, Some(now() + Duration::days(365)));
        assert!(validate_rights(Some(&started), now()).is_ok());
        assert!(validate_rights(Some(&ending), now()).is_ok());
    }

    #[test]
    fn agrees_with_rights_contains() {
        let rights = window(Some(now() - Duration::hours(2)), Some(now() + Duration::hours(2)));
        for offset in -4..=4 {
            let at = now() + Duration::hours(offset);
            assert_eq!(validate_rights(Some(&rights), at).is_ok(), rights.contains(at));
        }
    }
}
