//! ### Month
//! Calendar-month bucket keys, written as `<year>-<Mon>` (e.g. `2024-Mar`).

use std::{fmt, str::FromStr};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Year and month of a reading. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    // 1-based
    month: u32,
}

impl MonthKey {
    // Fixed English abbreviations; never locale dependent.
    const ABBREVIATIONS: [&'static str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];

    /// Returns `None` unless `month` is in `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn abbreviation(&self) -> &'static str {
        Self::ABBREVIATIONS[self.month as usize - 1]
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{}", self.year, self.abbreviation())
    }
}

impl FromStr for MonthKey {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AnalysisError::InvalidMonthKey(s.to_string());
        let (year, abbrev) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let idx = Self::ABBREVIATIONS
            .iter()
            .position(|candidate| candidate.eq_ignore_ascii_case(abbrev))
            .ok_or_else(invalid)?;
        Ok(Self {
            year,
            month: idx as u32 + 1,
        })
    }
}

impl TryFrom<String> for MonthKey {
    type Error = AnalysisError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(value: MonthKey) -> Self {
        value.to_string()
    }
}
