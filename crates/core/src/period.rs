//! Calendar-month billing periods.

use core::str::FromStr;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// A calendar month, represented by its first day.
///
/// Serialized as `YYYY-MM-DD` (always day `01`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "NaiveDate", into = "NaiveDate")]
pub struct BillingPeriod(NaiveDate);

impl BillingPeriod {
    pub fn from_ym(year: i32, month: u32) -> DomainResult<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .ok_or_else(|| DomainError::validation(format!("invalid billing month {year}-{month:02}")))
    }

    /// The period that contains `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self(date.with_day0(0).unwrap_or(date))
    }

    /// The period that contains the UTC calendar date of `at`.
    pub fn containing_instant(at: DateTime<Utc>) -> Self {
        Self::containing(at.date_naive())
    }

    /// Accepts only a first-of-month date.
    pub fn from_first_day(date: NaiveDate) -> DomainResult<Self> {
        if date.day() != 1 {
            return Err(DomainError::validation(format!(
                "billing period must start on the first day of a month, got {date}"
            )));
        }
        Ok(Self(date))
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn checked_add_months(&self, months: u32) -> Option<Self> {
        self.0.checked_add_months(Months::new(months)).map(Self)
    }

    /// The period immediately after this one.
    pub fn next(&self) -> DomainResult<Self> {
        self.checked_add_months(1)
            .ok_or_else(|| DomainError::invariant(format!("no billing period after {self}")))
    }
}

impl ValueObject for BillingPeriod {}

impl TryFrom<NaiveDate> for BillingPeriod {
    type Error = DomainError;

    fn try_from(value: NaiveDate) -> Result<Self, Self::Error> {
        Self::from_first_day(value)
    }
}

impl From<BillingPeriod> for NaiveDate {
    fn from(value: BillingPeriod) -> Self {
        value.0
    }
}

impl core::fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Parses `YYYY-MM` or `YYYY-MM-DD`; any day is normalized to the first of its month.
impl FromStr for BillingPeriod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::containing(date));
        }
        NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
            .map(Self)
            .map_err(|e| DomainError::validation(format!("invalid billing period '{s}': {e}")))
    }
}
