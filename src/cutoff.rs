//! Inactivity cutoff calculation.

use chrono::{DateTime, Days, Utc};
use serde::Serialize;

use crate::errors::{AuditError, AuditResult};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The boundary for one run, together with the instant it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cutoff {
    /// "Now", sampled once when the run started
    pub now: DateTime<Utc>,
    /// Accounts whose last login is strictly before this are inactive
    pub cutoff: DateTime<Utc>,
}

impl Cutoff {
    /// True when `last_login` falls strictly before the cutoff.
    pub fn is_inactive(&self, last_login: DateTime<Utc>) -> bool {
        last_login < self.cutoff
    }
}

/// Compute the inactivity cutoff: `now - inactivity_days` calendar days.
///
/// The clock is sampled exactly once, so every component of a run sees the
/// same boundary.
pub fn compute_cutoff(inactivity_days: i64, clock: &dyn Clock) -> AuditResult<Cutoff> {
    if inactivity_days <= 0 {
        return Err(AuditError::ConfigError(format!(
            "inactivity_days must be greater than 0, got {inactivity_days}"
        )));
    }

    let now = clock.now();
    let cutoff = now
        .checked_sub_days(Days::new(inactivity_days as u64))
        .ok_or_else(|| {
            AuditError::ConfigError(format!(
                "inactivity_days {inactivity_days} reaches before the supported calendar range"
            ))
        })?;

    Ok(Cutoff { now, cutoff })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn subtracts_whole_days() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap();
        let cutoff = compute_cutoff(30, &FixedClock(now)).unwrap();

        assert_eq!(cutoff.now, now);
        assert_eq!(
            cutoff.cutoff,
            Utc.with_ymd_and_hms(2024, 2, 14, 10, 30, 0).unwrap()
        );
    }

    #[test]
    fn year_across_leap_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let cutoff = compute_cutoff(365, &FixedClock(now)).unwrap();
        assert_eq!(cutoff.cutoff, Utc.with_ymd_and_hms(2023, 3, 2, 0, 0, 0).unwrap());
        assert_eq!(cutoff.now - cutoff.cutoff, Duration::days(365));
    }

    #[test]
    fn rejects_non_positive() {
        let clock = FixedClock(Utc::now());
        assert!(matches!(
            compute_cutoff(0, &clock),
            Err(AuditError::ConfigError(_))
        ));
        assert!(compute_cutoff(-7, &clock).is_err());
    }

    #[test]
    fn rejects_absurd_ranges() {
        let clock = FixedClock(Utc::now());
        assert!(compute_cutoff(i64::MAX, &clock).is_err());
    }

    #[test]
    fn inactive_is_strictly_before() {
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        let cutoff = compute_cutoff(1, &FixedClock(now)).unwrap();

        assert!(cutoff.is_inactive(cutoff.cutoff - Duration::seconds(1)));
        assert!(!cutoff.is_inactive(cutoff.cutoff));
        assert!(!cutoff.is_inactive(now));
    }
}
