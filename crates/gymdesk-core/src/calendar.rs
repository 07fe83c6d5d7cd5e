//! Local-day arithmetic in the gym's timezone

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// UTC bounds `[start, end)` of a calendar day in `tz`
pub fn day_bounds(date: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_midnight(date, tz);
    let end = date
        .succ_opt()
        .map(|next| local_midnight(next, tz))
        .unwrap_or(start + Duration::days(1));
    (start, end)
}

/// The calendar day `now` falls on in `tz`
pub fn local_today(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    // DST gaps can swallow midnight; take the earliest valid instant
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        chrono::LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utc_day_bounds() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 18).unwrap();
        let (start, end) = day_bounds(date, chrono_tz::UTC);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 18, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 19, 0, 0, 0).unwrap());
    }

    #[test]
    fn chicago_day_bounds_shift() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 18).unwrap();
        let (start, end) = day_bounds(date, chrono_tz::America::Chicago);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 18, 6, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 19, 6, 0, 0).unwrap());
    }

    #[test]
    fn local_today_crosses_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 1, 18, 3, 0, 0).unwrap();
        assert_eq!(
            local_today(now, chrono_tz::America::Chicago),
            NaiveDate::from_ymd_opt(2025, 1, 17).unwrap()
        );
    }
}
