//! Summary levels and period-key arithmetic
//!
//! Keys: daily `YYYY-MM-DD`, weekly `YYYY-Www` (ISO-8601 week, Monday start),
//! monthly `YYYY-MM`.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MemoryError, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryKind {
    Daily,
    Weekly,
    Monthly,
}

impl SummaryKind {
    pub const ALL: [SummaryKind; 3] = [SummaryKind::Daily, SummaryKind::Weekly, SummaryKind::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryKind::Daily => "daily",
            SummaryKind::Weekly => "weekly",
            SummaryKind::Monthly => "monthly",
        }
    }
}

impl fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryKind {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(SummaryKind::Daily),
            "weekly" => Ok(SummaryKind::Weekly),
            "monthly" => Ok(SummaryKind::Monthly),
            other => Err(MemoryError::InvalidScope(other.to_string())),
        }
    }
}

/// A resolved period: its key and inclusive date range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub kind: SummaryKind,
    pub key: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn parse(kind: SummaryKind, key: &str) -> Result<Self> {
        let key = key.trim();
        let invalid = || MemoryError::InvalidPeriodKey { kind: kind.to_string(), key: key.to_string() };
        let (start, end) = match kind {
            SummaryKind::Daily => {
                let d = NaiveDate::parse_from_str(key, DATE_FORMAT).map_err(|_| invalid())?;
                (d, d)
            }
            SummaryKind::Weekly => {
                let (year, week) = parse_week_key(key).ok_or_else(invalid)?;
                let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or_else(invalid)?;
                (monday, monday + Duration::days(6))
            }
            SummaryKind::Monthly => {
                let first = NaiveDate::parse_from_str(&format!("{}-01", key), DATE_FORMAT)
                    .map_err(|_| invalid())?;
                if key.len() != 7 {
                    return Err(invalid());
                }
                (first, last_day_of_month(first))
            }
        };
        // Canonical form, e.g. "2025-W2" becomes "2025-W02"
        let key = match kind {
            SummaryKind::Daily => start.format(DATE_FORMAT).to_string(),
            SummaryKind::Weekly => week_key(start),
            SummaryKind::Monthly => month_key(start),
        };
        Ok(Self { kind, key, start, end })
    }

    pub fn daily(date: NaiveDate) -> Self {
        Self { kind: SummaryKind::Daily, key: date.format(DATE_FORMAT).to_string(), start: date, end: date }
    }

    pub fn week_of(date: NaiveDate) -> Self {
        let start = date - Duration::days(date.weekday().num_days_from_monday() as i64);
        Self { kind: SummaryKind::Weekly, key: week_key(date), start, end: start + Duration::days(6) }
    }

    pub fn month_of(date: NaiveDate) -> Self {
        let start = first_day_of_month(date);
        Self { kind: SummaryKind::Monthly, key: month_key(date), start, end: last_day_of_month(start) }
    }

    pub fn start_str(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }

    /// Days covered by the period, in order
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }
}

/// ISO week key of a date, e.g. `2025-W02`
pub fn week_key(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{:04}-W{:02}", iso.year(), iso.week())
}

pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Monday and Sunday of an ISO week key
pub fn week_range(key: &str) -> Result<(NaiveDate, NaiveDate)> {
    let p = Period::parse(SummaryKind::Weekly, key)?;
    Ok((p.start, p.end))
}

/// First and last day of a `YYYY-MM` key
pub fn month_range(key: &str) -> Result<(NaiveDate, NaiveDate)> {
    let p = Period::parse(SummaryKind::Monthly, key)?;
    Ok((p.start, p.end))
}

fn parse_week_key(key: &str) -> Option<(i32, u32)> {
    let (year, week) = key.split_once("-W")?;
    if year.len() != 4 || week.is_empty() || week.len() > 2 {
        return None;
    }
    Some((year.parse().ok()?, week.parse().ok()?))
}

fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn last_day_of_month(first: NaiveDate) -> NaiveDate {
    let (y, m) = if first.month() == 12 { (first.year() + 1, 1) } else { (first.year(), first.month() + 1) };
    NaiveDate::from_ymd_opt(y, m, 1)
        .map(|next| next - Duration::days(1))
        .unwrap_or(first)
}
