//! Monthly return periods

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::GstConfig;
use crate::types::{GstError, GstResult, ReturnType};

/// A calendar month for which returns are filed.
///
/// Serialized as the statutory `MMYYYY` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReturnPeriod {
    year: i32,
    month: u32,
}

impl ReturnPeriod {
    pub fn new(month: u32, year: i32) -> GstResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(GstError::Validation(format!(
                "Return period month must be 1-12, got {month}"
            )));
        }
        if !(2017..=9999).contains(&year) {
            return Err(GstError::Validation(format!(
                "Return period year must be between 2017 and 9999, got {year}"
            )));
        }
        Ok(Self { year, month })
    }

    /// Period containing `date`
    pub fn containing(date: NaiveDate) -> GstResult<Self> {
        Self::new(date.month(), date.year())
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Statutory period code, e.g. `032024`
    pub fn code(&self) -> String {
        format!("{:02}{}", self.month, self.year)
    }

    pub fn start_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.next()
            .start_date()
            .pred_opt()
            .unwrap_or_default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date() && date <= self.end_date()
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Statutory due date: a fixed day of the following month
    pub fn due_date(&self, return_type: ReturnType, config: &GstConfig) -> NaiveDate {
        let day = match return_type {
            ReturnType::Gstr1 => config.gstr1_due_day,
            ReturnType::Gstr3b => config.gstr3b_due_day,
        };
        let next = self.next();
        NaiveDate::from_ymd_opt(next.year, next.month, day).unwrap_or_else(|| next.end_date())
    }
}

impl fmt::Display for ReturnPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{}", self.month, self.year)
    }
}

impl FromStr for ReturnPeriod {
    type Err = GstError;

    /// Accepts `YYYY-MM` or `MMYYYY`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || GstError::Validation(format!("Invalid return period '{s}'"));

        let (month, year) = match s.split_once('-') {
            Some((year, month)) if year.len() == 4 && month.len() == 2 => (month, year),
            Some(_) => return Err(invalid()),
            None if s.len() == 6 && s.is_char_boundary(2) => (&s[..2], &s[2..]),
            None => return Err(invalid()),
        };

        let month = month.parse().map_err(|_| invalid())?;
        let year = year.parse().map_err(|_| invalid())?;
        Self::new(month, year)
    }
}

impl TryFrom<String> for ReturnPeriod {
    type Error = GstError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReturnPeriod> for String {
    fn from(period: ReturnPeriod) -> Self {
        period.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_both_forms() {
        let a: ReturnPeriod = "2024-03".parse().unwrap();
        let b: ReturnPeriod = "032024".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.code(), "032024");

        assert!("2024-13".parse::<ReturnPeriod>().is_err());
        assert!("March 2024".parse::<ReturnPeriod>().is_err());
        assert!("".parse::<ReturnPeriod>().is_err());
    }

    #[test]
    fn test_date_range() {
        let period = ReturnPeriod::new(2, 2024).unwrap();
        assert_eq!(period.start_date(), date(2024, 2, 1));
        assert_eq!(period.end_date(), date(2024, 2, 29));
        assert!(period.contains(date(2024, 2, 29)));
        assert!(!period.contains(date(2024, 3, 1)));
    }

    #[test]
    fn test_year_rollover() {
        let january = ReturnPeriod::new(1, 2024).unwrap();
        assert_eq!(january.previous(), ReturnPeriod::new(12, 2023).unwrap());

        let december = ReturnPeriod::new(12, 2024).unwrap();
        assert_eq!(december.next(), ReturnPeriod::new(1, 2025).unwrap());
        assert_eq!(december.end_date(), date(2024, 12, 31));
    }

    #[test]
    fn test_due_dates() {
        let config = GstConfig::default();
        let period = ReturnPeriod::new(12, 2024).unwrap();

        assert_eq!(period.due_date(ReturnType::Gstr1, &config), date(2025, 1, 11));
        assert_eq!(period.due_date(ReturnType::Gstr3b, &config), date(2025, 1, 20));
    }

    #[test]
    fn test_serializes_as_code() {
        let period = ReturnPeriod::new(3, 2024).unwrap();
        let json = serde_json::to_string(&period).unwrap();
        assert_eq!(json, "\"032024\"");

        let back: ReturnPeriod = serde_json::from_str(&json).unwrap();
        assert_eq!(back, period);
    }
}
