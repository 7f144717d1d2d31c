//! Local wall-clock helpers. Offsets are minutes east of UTC.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};

pub fn local_datetime(now: DateTime<Utc>, offset_minutes: i32) -> NaiveDateTime {
    now.naive_utc() + Duration::minutes(offset_minutes as i64)
}

pub fn local_date(now: DateTime<Utc>, offset_minutes: i32) -> NaiveDate {
    local_datetime(now, offset_minutes).date()
}

/// Day of week with Sunday = 0.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// UTC instants bounding a local calendar day, end exclusive.
pub fn local_day_bounds(date: NaiveDate, offset_minutes: i32) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_local = date.and_time(chrono::NaiveTime::MIN);
    let start = (start_local - Duration::minutes(offset_minutes as i64)).and_utc();
    (start, start + Duration::days(1))
}
