//! Measurement point: one timestamped mole-fraction observation.

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single measurement at one site.
///
/// Monthly data carries month-aligned timestamps (first day of the month,
/// midnight). `mf` is the mole fraction; `None` marks a missing value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPoint {
    pub timestamp: NaiveDateTime,
    pub mf: Option<f64>,
    pub sd: Option<f64>,
    pub n: Option<u32>,
}

impl MeasurementPoint {
    pub fn new(timestamp: NaiveDateTime, mf: Option<f64>, sd: Option<f64>, n: Option<u32>) -> Self {
        Self {
            timestamp,
            mf: mf.filter(|v| v.is_finite()),
            sd: sd.filter(|v| v.is_finite()),
            n,
        }
    }

    /// A point with no mole fraction, used when regularizing onto a grid.
    pub fn missing(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            mf: None,
            sd: None,
            n: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.mf.is_some()
    }
}

/// Reporting cadence of a measurement program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Hourly,
    Daily,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Hourly => "hourly",
            Frequency::Daily => "daily",
            Frequency::Monthly => "monthly",
        }
    }

    /// Only monthly series are eligible for gap filling.
    pub fn supports_gapfill(&self) -> bool {
        matches!(self, Frequency::Monthly)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" | "hour" | "h" => Ok(Frequency::Hourly),
            "daily" | "day" | "d" => Ok(Frequency::Daily),
            "monthly" | "month" | "m" | "mm" => Ok(Frequency::Monthly),
            other => Err(format!("unknown frequency '{other}' (expected hourly, daily or monthly)")),
        }
    }
}

/// First day of the month containing `ts`, at midnight.
pub fn month_start(ts: NaiveDateTime) -> NaiveDateTime {
    let date = ts.date();
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
        .unwrap_or(date)
        .and_time(NaiveTime::MIN)
}

/// Month-start timestamp for a calendar year and month, if valid.
pub fn month_timestamp(year: i32, month: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, 1).map(|d| d.and_time(NaiveTime::MIN))
}

/// Shift a month-aligned timestamp by `months` (may be negative).
pub fn add_months(ts: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        ts.checked_add_months(magnitude)
    } else {
        ts.checked_sub_months(magnitude)
    }
}

/// Absolute month number (`year * 12 + month0`), used to step monthly grids.
pub fn month_ordinal(ts: NaiveDateTime) -> i64 {
    i64::from(ts.year()) * 12 + i64::from(ts.month0())
}

/// Whole months from `from` to `to` (negative when `to` is earlier).
pub fn months_between(from: NaiveDateTime, to: NaiveDateTime) -> i64 {
    month_ordinal(to) - month_ordinal(from)
}
