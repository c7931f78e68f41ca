// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and challenge boundaries.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;

/// Local hour after which no more regular updates are posted.
pub const END_OF_DAY_HOUR: u32 = 19;
/// Local hour on the following day at which a challenge closes.
pub const FINAL_HOUR: u32 = 8;

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format a date as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Calendar date of `instant` in `tz`.
pub fn challenge_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// `date` at `hour:00` local time, as a UTC instant.
///
/// Hours skipped by a DST transition resolve to the instant just after the gap,
/// ambiguous hours resolve to the earlier instant.
fn local_hour(date: NaiveDate, hour: u32, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN));
    match tz.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => {
            let shifted = naive + chrono::Duration::hours(1);
            tz.from_local_datetime(&shifted)
                .earliest()
                .map(|local| local.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
        }
    }
}

/// 19:00 local on the day the challenge was created.
pub fn end_of_day_boundary(creation: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    local_hour(challenge_date(creation, tz), END_OF_DAY_HOUR, tz)
}

/// 08:00 local on the day after the challenge was created.
pub fn final_boundary(creation: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let day = challenge_date(creation, tz);
    let next = day.checked_add_days(Days::new(1)).unwrap_or(day);
    local_hour(next, FINAL_HOUR, tz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Los_Angeles;

    fn la(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Los_Angeles
            .with_ymd_and_hms(y, m, d, h, min, s)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn boundaries_from_morning_creation() {
        let created = la(2019, 10, 11, 9, 0, 0);

        assert_eq!(
            end_of_day_boundary(created, Los_Angeles),
            la(2019, 10, 11, 19, 0, 0)
        );
        assert_eq!(
            final_boundary(created, Los_Angeles),
            la(2019, 10, 12, 8, 0, 0)
        );
    }

    #[test]
    fn boundaries_follow_local_date_not_utc_date() {
        // 20:30 local is already the next day in UTC
        let created = la(2019, 10, 11, 20, 30, 0);
        assert_eq!(
            challenge_date(created, Los_Angeles),
            NaiveDate::from_ymd_opt(2019, 10, 11).unwrap()
        );
        assert_eq!(
            final_boundary(created, Los_Angeles),
            la(2019, 10, 12, 8, 0, 0)
        );
    }

    #[test]
    fn final_boundary_across_dst_change() {
        // PDT ends on 2019-11-03
        let created = la(2019, 11, 2, 10, 0, 0);
        let final_at = final_boundary(created, Los_Angeles);
        assert_eq!(format_utc_rfc3339(final_at), "2019-11-03T16:00:00Z");
    }

    #[test]
    fn format_date_is_iso() {
        let date = NaiveDate::from_ymd_opt(2019, 1, 5).unwrap();
        assert_eq!(format_date(date), "2019-01-05");
    }
}
