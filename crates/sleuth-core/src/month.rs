//! Calendar month used as the unit of billing, filtering, and budgeting.
//!
//! Billing exports name months as `2025-10`; planning files use `Oct-25`.
//! [`BillingMonth`] parses both and orders chronologically.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SleuthError};

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// A calendar month (year + month number 1-12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BillingMonth {
    year: i32,
    month: u32,
}

impl BillingMonth {
    /// Create a month, rejecting month numbers outside 1-12.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(SleuthError::invalid_month(
                format!("{year:04}-{month:02}"),
                "month number must be between 1 and 12",
            ));
        }
        Ok(Self { year, month })
    }

    /// Parse the billing export format `YYYY-MM`.
    pub fn parse_iso(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let (year, month) = trimmed
            .split_once('-')
            .ok_or_else(|| SleuthError::invalid_month(value, "expected YYYY-MM"))?;

        if year.len() != 4 || month.is_empty() || month.len() > 2 {
            return Err(SleuthError::invalid_month(value, "expected YYYY-MM"));
        }

        let year: i32 = year
            .parse()
            .map_err(|_| SleuthError::invalid_month(value, "year is not a number"))?;
        let month: u32 = month
            .parse()
            .map_err(|_| SleuthError::invalid_month(value, "month is not a number"))?;

        Self::new(year, month).map_err(|_| SleuthError::invalid_month(value, "month must be 01-12"))
    }

    /// Parse the planning label format `Mon-YY` (a four-digit year is also accepted).
    pub fn parse_label(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let (name, year) = trimmed
            .split_once('-')
            .ok_or_else(|| SleuthError::invalid_month(value, "expected Mon-YY"))?;

        let month = MONTH_ABBREVIATIONS
            .iter()
            .position(|abbr| abbr.eq_ignore_ascii_case(name))
            .ok_or_else(|| SleuthError::invalid_month(value, "unknown month name"))?;

        let year =
            parse_short_year(year).ok_or_else(|| SleuthError::invalid_month(value, "bad year"))?;

        Self::new(year, month as u32 + 1)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The following calendar month.
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

    /// First day of the month.
    pub fn first_day(&self) -> NaiveDate {
        // month is validated on construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// First instant (UTC) of the month.
    pub fn start(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.first_day().and_time(chrono::NaiveTime::MIN))
    }

    /// First instant (UTC) after the month has fully elapsed.
    pub fn end(&self) -> DateTime<Utc> {
        self.next().start()
    }

    /// The month a timestamp falls in.
    pub fn from_datetime(timestamp: &DateTime<Utc>) -> Self {
        use chrono::Datelike;
        Self {
            year: timestamp.year(),
            month: timestamp.month(),
        }
    }

    /// `YYYY-MM`, the billing export format.
    pub fn iso(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// `Mon-YY`, the planning label format.
    pub fn label(&self) -> String {
        format!(
            "{}-{:02}",
            MONTH_ABBREVIATIONS[(self.month - 1) as usize],
            self.year.rem_euclid(100)
        )
    }
}

/// `25` -> 2025, `2025` -> 2025.
pub fn parse_short_year(value: &str) -> Option<i32> {
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    match value.len() {
        2 => value.parse::<i32>().ok().map(|y| 2000 + y),
        4 => value.parse().ok(),
        _ => None,
    }
}

impl FromStr for BillingMonth {
    type Err = SleuthError;

    /// Accepts either `YYYY-MM` or `Mon-YY`.
    fn from_str(s: &str) -> Result<Self> {
        let starts_with_digit = s.trim().chars().next().is_some_and(|c| c.is_ascii_digit());
        if starts_with_digit {
            Self::parse_iso(s)
        } else {
            Self::parse_label(s)
        }
    }
}

impl fmt::Display for BillingMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl TryFrom<String> for BillingMonth {
    type Error = SleuthError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BillingMonth> for String {
    fn from(month: BillingMonth) -> Self {
        month.iso()
    }
}
