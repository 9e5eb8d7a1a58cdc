//! Adaptive re-check throttling.
//!
//! Upstream forecast models refresh roughly every six hours, so checking a
//! rule more often than its target date warrants wastes provider quota
//! without gaining information.

use chrono::{DateTime, NaiveDate, Utc};

/// Minimum hours between checks, by how far away the rule's start date is.
pub fn min_interval_hours(days_until_start: f64) -> i64 {
    if days_until_start <= 1.0 {
        6
    } else if days_until_start <= 4.0 {
        12
    } else if days_until_start <= 16.0 {
        24
    } else {
        48
    }
}

/// Decide whether this polling pass should skip a rule entirely.
///
/// A rule that has never been checked is always evaluated. Otherwise the rule
/// is skipped while the elapsed time since its last check is below the
/// proximity-scaled minimum interval.
pub fn should_skip_check(
    last_checked_at: Option<DateTime<Utc>>,
    start_date: NaiveDate,
    now: DateTime<Utc>,
) -> bool {
    let Some(last_checked) = last_checked_at else {
        return false;
    };

    let start = start_date
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(now);
    let days_until_start =
        ((start - now).num_seconds() as f64 / 86_400.0).max(0.0);

    let elapsed_hours = (now - last_checked).num_seconds() as f64 / 3_600.0;
    elapsed_hours < min_interval_hours(days_until_start) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse::<DateTime<Utc>>().unwrap()
    }

    #[test]
    fn never_checked_is_never_skipped() {
        let now = Utc.with_ymd_and_hms(2026, 2, 13, 12, 0, 0).unwrap();
        assert!(!should_skip_check(None, date("2026-02-16"), now));
        assert!(!should_skip_check(None, date("2030-01-01"), now));
    }

    #[test]
    fn interval_shrinks_as_start_approaches() {
        assert_eq!(min_interval_hours(30.0), 48);
        assert_eq!(min_interval_hours(16.0), 24);
        assert_eq!(min_interval_hours(10.0), 24);
        assert_eq!(min_interval_hours(4.0), 12);
        assert_eq!(min_interval_hours(2.5), 12);
        assert_eq!(min_interval_hours(1.0), 6);
        assert_eq!(min_interval_hours(0.0), 6);

        // Monotone: closer start date never lengthens the interval.
        let mut prev = i64::MAX;
        for days in [40.0, 16.0, 8.0, 4.0, 2.0, 1.0, 0.5, 0.0] {
            let interval = min_interval_hours(days);
            assert!(interval <= prev);
            prev = interval;
        }
    }

    #[test]
    fn recent_check_three_days_out_is_skipped() {
        // 3h since last check, rule 2.5 days out needs a 12h interval.
        let now = at("2026-02-13T12:00:00Z");
        let last = at("2026-02-13T09:00:00Z");
        assert!(should_skip_check(Some(last), date("2026-02-16"), now));
    }

    #[test]
    fn stale_check_three_days_out_is_evaluated() {
        // 20h since last check exceeds the 12h interval.
        let now = at("2026-02-13T12:00:00Z");
        let last = at("2026-02-12T16:00:00Z");
        assert!(!should_skip_check(Some(last), date("2026-02-16"), now));
    }

    #[test]
    fn past_start_date_uses_tightest_interval() {
        let now = at("2026-02-13T12:00:00Z");
        let last = at("2026-02-13T05:00:00Z");
        // Started yesterday: days_until_start clamps to 0, interval 6h, 7h elapsed.
        assert!(!should_skip_check(Some(last), date("2026-02-12"), now));
        let recent = at("2026-02-13T08:00:00Z");
        assert!(should_skip_check(Some(recent), date("2026-02-12"), now));
    }
}
