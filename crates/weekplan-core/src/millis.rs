//! Epoch-millisecond conversions
//!
//! Both the SQLite store and the remote rows keep timestamps as integer
//! milliseconds. Calendar dates are anchored at UTC midnight.

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Millisecond timestamp of a UTC instant
pub fn from_datetime(at: &DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// UTC instant for a millisecond timestamp, `None` if out of range
pub fn to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// Millisecond timestamp of UTC midnight on `date`
pub fn from_date(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

/// Calendar date (UTC) containing the millisecond timestamp
pub fn to_date(ms: i64) -> Option<NaiveDate> {
    to_datetime(ms).map(|dt| dt.date_naive())
}

/// Milliseconds elapsed since midnight for a time of day
pub fn from_time_of_day(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight()) * 1000 + i64::from(time.nanosecond() / 1_000_000)
}

/// Time of day for milliseconds since midnight (wraps at 24h)
pub fn to_time_of_day(ms: i64) -> Option<NaiveTime> {
    let ms = ms.rem_euclid(MILLIS_PER_DAY);
    NaiveTime::from_num_seconds_from_midnight_opt((ms / 1000) as u32, ((ms % 1000) * 1_000_000) as u32)
}

/// Absolute timestamp of `time` on `date`, UTC
pub fn from_date_time(date: NaiveDate, time: NaiveTime) -> i64 {
    from_date(date) + from_time_of_day(time)
}

/// Truncate an instant to millisecond precision
pub fn truncate(at: DateTime<Utc>) -> DateTime<Utc> {
    to_datetime(from_datetime(&at)).unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_anchored_at_midnight() {
        let date = NaiveDate::from_ymd_opt(1970, 1, 2).unwrap();
        assert_eq!(from_date(date), MILLIS_PER_DAY);
        assert_eq!(to_date(MILLIS_PER_DAY + 5), Some(date));
    }

    #[test]
    fn test_time_of_day_keeps_millis() {
        let time = NaiveTime::from_hms_milli_opt(13, 45, 7, 250).unwrap();
        let ms = from_time_of_day(time);
        assert_eq!(ms, ((13 * 60 + 45) * 60 + 7) * 1000 + 250);
        assert_eq!(to_time_of_day(ms), Some(time));
    }

    #[test]
    fn test_absolute_time_of_day_wraps() {
        let date = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();
        let time = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let absolute = from_date_time(date, time);
        assert_eq!(to_date(absolute), Some(date));
        assert_eq!(to_time_of_day(absolute), Some(time));
    }

    #[test]
    fn test_truncate_drops_sub_millisecond_precision() {
        let at = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        let truncated = truncate(at);
        assert_eq!(truncated.timestamp_subsec_nanos(), 123_000_000);
    }
}
