//! Date representations crossing the engine boundary.
//!
//! Two forms appear in the account/transaction API: a signed 64-bit
//! seconds-since-epoch instant (`Time64`) and a calendar date with no time
//! component (`chrono::NaiveDate`). The helpers here interconvert at day
//! granularity; all day arithmetic is in UTC.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::error::{EngineError, EngineResult};

/// Seconds since the Unix epoch, signed.
pub type Time64 = i64;

const SECS_PER_DAY: i64 = 86_400;

/// Current time as a `Time64`.
pub fn now() -> Time64 {
    Utc::now().timestamp()
}

/// First second (00:00:00 UTC) of the given calendar date.
pub fn date_to_seconds(date: NaiveDate) -> Time64 {
    date.and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc()
        .timestamp()
}

/// Last second (23:59:59 UTC) of the given calendar date.
///
/// This is the cutoff used by "balance as of date" queries, which include
/// every transaction posted on the date itself.
pub fn date_end_seconds(date: NaiveDate) -> Time64 {
    date_to_seconds(date) + SECS_PER_DAY - 1
}

/// Calendar date containing the given instant.
pub fn seconds_to_date(t: Time64) -> NaiveDate {
    DateTime::<Utc>::from_timestamp(t, 0)
        .map(|dt| dt.date_naive())
        // Out-of-range instants clamp to the representable extremes.
        .unwrap_or(if t < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// Normalize an instant to the first second of its day.
pub fn day_start(t: Time64) -> Time64 {
    date_to_seconds(seconds_to_date(t))
}

/// Normalize an instant to the last second of its day.
pub fn day_end(t: Time64) -> Time64 {
    date_end_seconds(seconds_to_date(t))
}

/// Build a `Time64` from day/month/year, at the start of the day.
pub fn dmy_to_seconds(day: u32, month: u32, year: i32) -> EngineResult<Time64> {
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        EngineError::validation(format!("invalid calendar date {year:04}-{month:02}-{day:02}"))
    })?;
    Ok(date_to_seconds(date))
}

/// Day/month/year of the given instant.
pub fn seconds_to_dmy(t: Time64) -> (u32, u32, i32) {
    let date = seconds_to_date(t);
    (date.day(), date.month(), date.year())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_round_trips_at_day_granularity() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let t = date_to_seconds(date);
        assert_eq!(seconds_to_date(t), date);
        assert_eq!(seconds_to_date(date_end_seconds(date)), date);
    }

    #[test]
    fn day_end_includes_whole_day() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(date_end_seconds(date) - date_to_seconds(date), 86_399);
    }

    #[test]
    fn day_start_and_end_normalize_arbitrary_instants() {
        let noon = date_to_seconds(NaiveDate::from_ymd_opt(2023, 6, 15).unwrap()) + 43_200;
        assert_eq!(day_start(noon) % 86_400, 0);
        assert_eq!(day_end(noon) - day_start(noon), 86_399);
    }

    #[test]
    fn dmy_rejects_impossible_dates() {
        assert!(dmy_to_seconds(30, 2, 2024).is_err());
        assert!(dmy_to_seconds(29, 2, 2024).is_ok());
    }
}
