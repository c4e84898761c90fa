//! Pure date/time checks behind the reservation rules.
//!
//! Appointment instants are interpreted in the service's local time
//! zone: the `DD-MM-YYYY` date and `HH:MM` time are combined into a
//! naive datetime and compared against `Local::now()`. The same policy
//! applies everywhere an instant is built; no per-request offsets.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

/// Hours before the appointment during which changes are refused.
pub(crate) const CANCELLATION_WINDOW_HOURS: f64 = 3.0;

/// Strict `DD-MM-YYYY` check: zero-padded fields and a real calendar
/// date (rejects e.g. `31-02-2024`).
pub(crate) fn valid_date(appt_date: &str) -> bool {
    let pattern = r"^(0[1-9]|[12][0-9]|3[01])-(0[1-9]|1[0-2])-\d{4}$";
    if !Regex::new(pattern).is_ok_and(|regex| regex.is_match(appt_date)) {
        return false;
    }
    parse_date(appt_date).is_some()
}

/// Strict `HH:MM` check, hour 00-23, minute 00-59, leading zero
/// required (`9:30` is rejected).
pub(crate) fn valid_time_of_day(appt_time: &str) -> bool {
    Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").is_ok_and(|regex| regex.is_match(appt_time))
}

/// Convert `HH:MM` to minutes since midnight for range comparisons.
pub(crate) fn minutes_since_midnight(hhmm: &str) -> Option<u32> {
    let mut parts = hhmm.splitn(2, ':');
    let hours: u32 = parts.next()?.parse().ok()?;
    let minutes: u32 = parts.next()?.parse().ok()?;
    Some(hours * 60 + minutes)
}

/// Appointment time must fall in `[open, close]`, inclusive on both
/// ends. Unparseable inputs are treated as outside.
pub(crate) fn within_operating_hours(appt_time: &str, open_time: &str, close_time: &str) -> bool {
    let (Some(appt), Some(open), Some(close)) = (
        minutes_since_midnight(appt_time),
        minutes_since_midnight(open_time),
        minutes_since_midnight(close_time),
    ) else {
        return false;
    };
    appt >= open && appt <= close
}

/// Signed fractional hours from now until the appointment instant.
/// `None` when either component fails to parse.
pub(crate) fn hours_until(appt_date: &str, appt_time: &str) -> Option<f64> {
    let appt = appointment_instant(appt_date, appt_time)?;
    let now = Local::now().naive_local();
    let seconds = appt.signed_duration_since(now).num_seconds();
    #[allow(clippy::cast_precision_loss)]
    Some(seconds as f64 / 3600.0)
}

/// True when the appointment instant is already behind us.
pub(crate) fn is_past(appt_date: &str, appt_time: &str) -> bool {
    hours_until(appt_date, appt_time).is_some_and(|hours| hours < 0.0)
}

/// True when the reservation may still be changed or cancelled: at
/// least 3 hours ahead, or already in the past. Only the (0,3)-hour
/// window immediately before the appointment is refused.
pub(crate) fn cancellable_now(appt_date: &str, appt_time: &str) -> bool {
    hours_until(appt_date, appt_time)
        .is_some_and(|hours| hours >= CANCELLATION_WINDOW_HOURS || hours < 0.0)
}

fn parse_date(appt_date: &str) -> Option<NaiveDate> {
    let mut parts = appt_date.splitn(3, '-');
    let day: u32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let year: i32 = parts.next()?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn appointment_instant(appt_date: &str, appt_time: &str) -> Option<NaiveDateTime> {
    let date = parse_date(appt_date)?;
    let time = NaiveTime::parse_from_str(appt_time, "%H:%M").ok()?;
    Some(NaiveDateTime::new(date, time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Timelike};

    /// Format `Local::now() + offset` as (DD-MM-YYYY, HH:MM), rounded
    /// up to the next whole minute so truncating seconds in the string
    /// never pulls the instant below the requested offset.
    fn appointment_in(offset: Duration) -> (String, String) {
        let mut instant = Local::now().naive_local() + offset;
        instant += Duration::seconds(60 - i64::from(instant.second()));
        (
            instant.format("%d-%m-%Y").to_string(),
            instant.format("%H:%M").to_string(),
        )
    }

    #[test]
    fn valid_date_accepts_real_dates() {
        assert!(valid_date("01-01-2024"));
        assert!(valid_date("29-02-2024"));
        assert!(valid_date("31-12-2099"));
    }

    #[test]
    fn valid_date_rejects_impossible_dates() {
        assert!(!valid_date("31-02-2024"));
        assert!(!valid_date("29-02-2023"));
        assert!(!valid_date("31-04-2024"));
    }

    #[test]
    fn valid_date_rejects_bad_format() {
        assert!(!valid_date(""));
        assert!(!valid_date("2024-01-01"));
        assert!(!valid_date("1-01-2024"));
        assert!(!valid_date("01/01/2024"));
        assert!(!valid_date("32-01-2024"));
        assert!(!valid_date("01-13-2024"));
    }

    #[test]
    fn valid_time_accepts_full_range() {
        assert!(valid_time_of_day("00:00"));
        assert!(valid_time_of_day("09:30"));
        assert!(valid_time_of_day("23:59"));
    }

    #[test]
    fn valid_time_rejects_out_of_range_and_unpadded() {
        assert!(!valid_time_of_day("24:00"));
        assert!(!valid_time_of_day("12:60"));
        assert!(!valid_time_of_day("9:30"));
        assert!(!valid_time_of_day("12:5"));
        assert!(!valid_time_of_day(""));
    }

    #[test]
    fn minutes_since_midnight_converts() {
        assert_eq!(minutes_since_midnight("00:00"), Some(0));
        assert_eq!(minutes_since_midnight("09:05"), Some(545));
        assert_eq!(minutes_since_midnight("23:59"), Some(1439));
        assert_eq!(minutes_since_midnight("nope"), None);
    }

    #[test]
    fn operating_hours_inclusive_on_both_ends() {
        assert!(within_operating_hours("09:00", "09:00", "17:00"));
        assert!(within_operating_hours("17:00", "09:00", "17:00"));
        assert!(within_operating_hours("12:30", "09:00", "17:00"));
        assert!(!within_operating_hours("17:01", "09:00", "17:00"));
        assert!(!within_operating_hours("08:59", "09:00", "17:00"));
    }

    #[test]
    fn hours_until_none_for_garbage() {
        assert_eq!(hours_until("bogus", "10:00"), None);
        assert_eq!(hours_until("01-01-2024", "bogus"), None);
    }

    #[test]
    fn hours_until_sign_matches_direction() {
        let (date, time) = appointment_in(Duration::hours(5));
        assert!(hours_until(&date, &time).is_some_and(|h| h > 4.0));

        let (date, time) = appointment_in(Duration::hours(-5));
        assert!(hours_until(&date, &time).is_some_and(|h| h < -4.0));
    }

    #[test]
    fn past_appointment_detected() {
        let (date, time) = appointment_in(Duration::hours(-1));
        assert!(is_past(&date, &time));

        let (date, time) = appointment_in(Duration::hours(1));
        assert!(!is_past(&date, &time));
    }

    #[test]
    fn cancellable_outside_window() {
        // Exactly three hours out (rounded up to the minute) is allowed.
        let (date, time) = appointment_in(Duration::hours(3));
        assert!(cancellable_now(&date, &time));

        let (date, time) = appointment_in(Duration::hours(4));
        assert!(cancellable_now(&date, &time));
    }

    #[test]
    fn not_cancellable_inside_window() {
        let (date, time) = appointment_in(Duration::hours(2));
        assert!(!cancellable_now(&date, &time));

        let (date, time) = appointment_in(Duration::minutes(30));
        assert!(!cancellable_now(&date, &time));
    }

    #[test]
    fn past_appointments_always_cancellable() {
        let (date, time) = appointment_in(Duration::hours(-2));
        assert!(cancellable_now(&date, &time));
    }

    #[test]
    fn unparseable_never_cancellable() {
        assert!(!cancellable_now("", "10:00"));
        assert!(!is_past("", ""));
    }
}
