//! Calendar helpers.
//!
//! Expense dates are calendar days in UTC; time of day carries no meaning.

use chrono::{DateTime, Datelike, Months, NaiveDate, SecondsFormat, Utc};

use crate::{EngineError, ResultEngine};

/// Current UTC calendar day.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// `YYYY-MM-DD`.
pub fn format_day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `YYYY-MM`.
pub fn format_month(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// ISO-8601 UTC instant with millisecond precision (`2024-02-15T10:00:00.000Z`).
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a calendar day.
///
/// Accepts a plain `YYYY-MM-DD` day or a full RFC 3339 instant, in which case
/// the UTC calendar day of that instant is taken.
pub fn parse_day(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    parse_instant(value).map(|instant| instant.date_naive())
}

/// [`parse_day`] for user input: anything unparseable is an
/// [`EngineError::InvalidDate`].
pub fn require_day(value: &str) -> ResultEngine<NaiveDate> {
    parse_day(value).ok_or_else(|| EngineError::InvalidDate(value.to_string()))
}

pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|instant| instant.with_timezone(&Utc))
}

pub fn is_first_day_of_month(date: NaiveDate) -> bool {
    date.day() == 1
}

pub fn start_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last calendar day of the month of `date`.
pub fn end_of_month(date: NaiveDate) -> NaiveDate {
    start_of_next_month(date).pred_opt().unwrap_or(date)
}

pub fn start_of_next_month(date: NaiveDate) -> NaiveDate {
    add_months(start_of_month(date), 1)
}

/// Shifts `date` by `months` (may be negative), clamping the day to the end
/// of the target month. Out of range results leave the date unchanged.
pub fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months.unsigned_abs()))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.unwrap_or(date)
}
