use chrono::{Month, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Day of the month on which a fee falls due (in the month after billing).
pub const DUE_DAY: u32 = 15;

/// A year as it arrives in a request body: either a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum YearValue {
    Number(i64),
    Text(String),
}

impl YearValue {
    /// Coerces the value to a positive calendar year.
    pub fn to_year(&self) -> Result<i32, AppError> {
        let raw = match self {
            YearValue::Number(n) => *n,
            YearValue::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| AppError::Validation(format!("Invalid year '{s}'")))?,
        };

        i32::try_from(raw)
            .ok()
            .filter(|y| *y > 0)
            .ok_or_else(|| AppError::Validation(format!("Year must be a positive integer, got {raw}")))
    }
}

impl From<i32> for YearValue {
    fn from(year: i32) -> Self {
        YearValue::Number(year.into())
    }
}

/// Parses one of the twelve canonical month names ("January" .. "December").
pub fn parse_month(name: &str) -> Result<Month, AppError> {
    let trimmed = name.trim();
    (1..=12u8)
        .filter_map(|n| Month::try_from(n).ok())
        .find(|m| m.name() == trimmed)
        .ok_or_else(|| {
            AppError::Validation(format!(
                "Invalid month '{name}'; expected a full month name such as \"January\""
            ))
        })
}

/// One calendar month of one year that fees are billed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    pub month: Month,
    pub year: i32,
}

impl BillingPeriod {
    pub fn new(month: Month, year: i32) -> Self {
        Self { month, year }
    }

    /// Validates raw request values into a period whose due date is a
    /// representable calendar date.
    pub fn parse(month: &str, year: &YearValue) -> Result<Self, AppError> {
        let period = Self::new(parse_month(month)?, year.to_year()?);
        period.due_date()?;
        Ok(period)
    }

    pub fn month_name(&self) -> &'static str {
        self.month.name()
    }

    /// Upper-cased three letter abbreviation, e.g. `JAN`.
    pub fn month_abbr(&self) -> String {
        self.month.name()[..3].to_uppercase()
    }

    /// Fees are due on the 15th of the month after the billing month.
    /// December rolls over into January of the next year.
    pub fn due_date(&self) -> Result<NaiveDate, AppError> {
        let out_of_range = || AppError::Validation(format!("Year {} is out of range", self.year));
        let year = if self.month == Month::December {
            self.year.checked_add(1).ok_or_else(out_of_range)?
        } else {
            self.year
        };

        NaiveDate::from_ymd_opt(year, self.month.succ().number_from_month(), DUE_DAY)
            .ok_or_else(out_of_range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month_accepts_canonical_names_only() {
        assert_eq!(parse_month("January").unwrap(), Month::January);
        assert_eq!(parse_month(" December ").unwrap(), Month::December);
        assert!(parse_month("january").is_err());
        assert!(parse_month("Jan").is_err());
        assert!(parse_month("").is_err());
    }

    #[test]
    fn test_year_coercion() {
        assert_eq!(YearValue::Number(2025).to_year().unwrap(), 2025);
        assert_eq!(YearValue::Text("2025".into()).to_year().unwrap(), 2025);
        assert!(YearValue::Number(0).to_year().is_err());
        assert!(YearValue::Number(-4).to_year().is_err());
        assert!(YearValue::Text("twenty".into()).to_year().is_err());
    }

    #[test]
    fn test_year_value_deserializes_from_number_or_string() {
        let n: YearValue = serde_json::from_str("2025").unwrap();
        let s: YearValue = serde_json::from_str("\"2025\"").unwrap();
        assert_eq!(n.to_year().unwrap(), s.to_year().unwrap());
    }

    #[test]
    fn test_due_date_is_fifteenth_of_next_month() {
        let period = BillingPeriod::new(Month::January, 2025);
        assert_eq!(
            period.due_date().unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 15).unwrap()
        );
    }

    #[test]
    fn test_december_due_date_rolls_into_next_year() {
        let period = BillingPeriod::new(Month::December, 2025);
        assert_eq!(
            period.due_date().unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
        );
    }

    #[test]
    fn test_unrepresentable_years_are_rejected() {
        let last = BillingPeriod::new(Month::December, i32::MAX);
        assert!(matches!(last.due_date(), Err(AppError::Validation(_))));

        assert!(BillingPeriod::parse("December", &YearValue::Number(i64::from(i32::MAX))).is_err());
        assert!(BillingPeriod::parse("March", &YearValue::Number(300_000)).is_err());
        assert!(BillingPeriod::parse("March", &YearValue::Number(2025)).is_ok());
    }

    #[test]
    fn test_month_abbreviation() {
        assert_eq!(BillingPeriod::new(Month::September, 2025).month_abbr(), "SEP");
    }
}
