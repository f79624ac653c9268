use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::ser::Error as SerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Month};

use crate::ValidationError;

const ISO_DATE: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

/// Calendar date without time-of-day, serialized as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate(Date);

impl CalendarDate {
    pub fn from_ymd(year: i32, month: u8, day: u8) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidDate {
            value: format!("{year:04}-{month:02}-{day:02}"),
        };
        let month = Month::try_from(month).map_err(|_| invalid())?;
        Date::from_calendar_date(year, month, day)
            .map(Self)
            .map_err(|_| invalid())
    }

    /// Parses exactly `YYYY-MM-DD`; signs, padding and surrounding whitespace
    /// are rejected.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidDate {
            value: input.to_owned(),
        };

        if !input.starts_with(|ch: char| ch.is_ascii_digit()) {
            return Err(invalid());
        }
        Date::parse(input, ISO_DATE).map(Self).map_err(|_| invalid())
    }

    pub const fn from_date(date: Date) -> Self {
        Self(date)
    }

    pub const fn into_inner(self) -> Date {
        self.0
    }

    /// Adds whole calendar months, clamping the day to the end of the target
    /// month (Jan 31 + 1 month is Feb 28 or 29).
    pub fn add_months(self, months: u32) -> Result<Self, ValidationError> {
        let month_index = i64::from(self.0.year()) * 12 + i64::from(u8::from(self.0.month())) - 1
            + i64::from(months);
        let year = i32::try_from(month_index.div_euclid(12))
            .map_err(|_| ValidationError::DateOutOfRange)?;
        let month = u8::try_from(month_index.rem_euclid(12) + 1)
            .ok()
            .and_then(|month| Month::try_from(month).ok())
            .ok_or(ValidationError::DateOutOfRange)?;

        let day = self.0.day().min(month.length(year));
        Date::from_calendar_date(year, month, day)
            .map(Self)
            .map_err(|_| ValidationError::DateOutOfRange)
    }

    pub fn format_iso(self) -> Result<String, ValidationError> {
        self.0
            .format(ISO_DATE)
            .map_err(|_| ValidationError::DateOutOfRange)
    }
}

impl Display for CalendarDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let formatted = self.format_iso().map_err(|_| std::fmt::Error)?;
        f.write_str(&formatted)
    }
}

impl FromStr for CalendarDate {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Serialize for CalendarDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = self.format_iso().map_err(S::Error::custom)?;
        serializer.serialize_str(&formatted)
    }
}

impl<'de> Deserialize<'de> for CalendarDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(input: &str) -> CalendarDate {
        CalendarDate::parse(input).expect("valid date")
    }

    #[test]
    fn parses_and_formats_iso_date() {
        assert_eq!(date("2024-01-01").to_string(), "2024-01-01");
    }

    #[test]
    fn rejects_malformed_dates() {
        for input in [
            "2024-1-01",
            "2024-02-30",
            "20240101",
            "2024-01-01-01",
            "abcd-01-01",
            "+202-01-01",
            "+2024-01-01",
            "-2024-01-01",
            " 2024-01-01 ",
            "2024-01-01T00:00:00Z",
        ] {
            let err = CalendarDate::parse(input).expect_err("must fail");
            assert!(matches!(err, ValidationError::InvalidDate { .. }), "{input}");
        }
    }

    #[test]
    fn adds_months_across_years() {
        assert_eq!(date("2024-01-01").add_months(12).expect("in range"), date("2025-01-01"));
        assert_eq!(date("2024-11-15").add_months(3).expect("in range"), date("2025-02-15"));
    }

    #[test]
    fn clamps_to_month_end() {
        assert_eq!(date("2024-01-31").add_months(1).expect("in range"), date("2024-02-29"));
        assert_eq!(date("2023-01-31").add_months(1).expect("in range"), date("2023-02-28"));
        assert_eq!(date("2024-08-31").add_months(1).expect("in range"), date("2024-09-30"));
    }

    #[test]
    fn round_trips_through_json() {
        let parsed: CalendarDate = serde_json::from_str("\"2028-01-01\"").expect("must parse");
        assert_eq!(serde_json::to_string(&parsed).expect("serialize"), "\"2028-01-01\"");
    }
}
