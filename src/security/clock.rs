//! Pacific day-boundary math
//!
//! Daily counters reset at midnight Pacific time. These functions are pure
//! and deterministic: the same UTC instant always maps to the same boundary.
//! DST is approximated by month (March through November observe UTC-7,
//! otherwise UTC-8); exact IANA transition rules are deliberately not
//! consulted.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};

const PST_OFFSET_SECS: i32 = -8 * 3600;
const PDT_OFFSET_SECS: i32 = -7 * 3600;

/// Pacific UTC offset in effect at `instant`
///
/// The month is taken from the instant shifted to standard time, so an
/// instant shortly after a UTC month rollover still lands on the Pacific
/// calendar month.
pub fn pacific_offset(instant: DateTime<Utc>) -> FixedOffset {
    use chrono::Datelike;
    let standard = instant + Duration::seconds(PST_OFFSET_SECS as i64);
    let month = standard.month();
    let secs = if (3..=11).contains(&month) {
        PDT_OFFSET_SECS
    } else {
        PST_OFFSET_SECS
    };
    FixedOffset::east_opt(secs).unwrap()
}

/// Pacific midnight at the start of the day containing `instant`, as UTC
pub fn day_start(instant: DateTime<Utc>) -> DateTime<Utc> {
    let offset = pacific_offset(instant);
    let local_midnight = instant
        .with_timezone(&offset)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    offset
        .from_local_datetime(&local_midnight)
        .unwrap()
        .with_timezone(&Utc)
}

/// The Pacific calendar date containing `instant`
pub fn local_date(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&pacific_offset(instant)).date_naive()
}

/// The first Pacific midnight strictly after `instant`, as UTC
///
/// Today's midnight is never returned: even an instant exactly on a boundary
/// rolls forward to the next day.
pub fn next_midnight(instant: DateTime<Utc>) -> DateTime<Utc> {
    let offset = pacific_offset(instant);
    let tomorrow = instant
        .with_timezone(&offset)
        .date_naive()
        .succ_opt()
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    offset
        .from_local_datetime(&tomorrow)
        .unwrap()
        .with_timezone(&Utc)
}

/// Pacific hour of day (0-23) at `instant`
pub fn local_hour(instant: DateTime<Utc>) -> u32 {
    use chrono::Timelike;
    instant.with_timezone(&pacific_offset(instant)).hour()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_winter_uses_standard_offset() {
        let instant = utc(2024, 1, 15, 12, 0, 0);
        assert_eq!(pacific_offset(instant).local_minus_utc(), -8 * 3600);
    }

    #[test]
    fn test_summer_uses_daylight_offset() {
        let instant = utc(2024, 7, 15, 12, 0, 0);
        assert_eq!(pacific_offset(instant).local_minus_utc(), -7 * 3600);
    }

    #[test]
    fn test_day_start_floors_to_pacific_midnight() {
        // 2024-07-15 12:00 UTC is 05:00 PDT; the boundary is 07:00 UTC
        let instant = utc(2024, 7, 15, 12, 0, 0);
        assert_eq!(day_start(instant), utc(2024, 7, 15, 7, 0, 0));
    }

    #[test]
    fn test_day_start_handles_utc_date_ahead_of_local() {
        // 2024-07-16 02:00 UTC is still 2024-07-15 19:00 PDT
        let instant = utc(2024, 7, 16, 2, 0, 0);
        assert_eq!(day_start(instant), utc(2024, 7, 15, 7, 0, 0));
        assert_eq!(
            local_date(instant),
            NaiveDate::from_ymd_opt(2024, 7, 15).unwrap()
        );
    }

    #[test]
    fn test_day_start_is_deterministic() {
        let instant = utc(2024, 3, 20, 23, 59, 59);
        assert_eq!(day_start(instant), day_start(instant));
    }

    #[test]
    fn test_next_midnight_rolls_to_tomorrow() {
        // 19:00 PDT on the 15th: next boundary is the 16th's midnight (07:00 UTC)
        let instant = utc(2024, 7, 16, 2, 0, 0);
        assert_eq!(next_midnight(instant), utc(2024, 7, 16, 7, 0, 0));
    }

    #[test]
    fn test_next_midnight_on_boundary_is_strictly_after() {
        let boundary = utc(2024, 7, 15, 7, 0, 0);
        assert_eq!(next_midnight(boundary), utc(2024, 7, 16, 7, 0, 0));
        assert!(next_midnight(boundary) > boundary);
    }

    #[test]
    fn test_local_hour() {
        // 12:00 UTC in winter is 04:00 PST
        assert_eq!(local_hour(utc(2024, 1, 15, 12, 0, 0)), 4);
        // 12:00 UTC in summer is 05:00 PDT
        assert_eq!(local_hour(utc(2024, 7, 15, 12, 0, 0)), 5);
    }

    #[test]
    fn test_boundary_advances_across_days() {
        let day1 = utc(2024, 7, 15, 12, 0, 0);
        let day2 = day1 + Duration::days(1);
        assert_ne!(day_start(day1), day_start(day2));
        assert_eq!(day_start(day2) - day_start(day1), Duration::days(1));
    }

    #[test]
    fn test_day_start_hour_is_midnight_local() {
        for (mo, d) in [(1, 10), (4, 2), (7, 30), (11, 20), (12, 25)] {
            let instant = utc(2024, mo, d, 15, 30, 0);
            let start = day_start(instant);
            let local = start.with_timezone(&pacific_offset(start));
            assert_eq!(local.hour(), 0, "month {mo}");
            assert_eq!(local.minute(), 0);
        }
    }
}
