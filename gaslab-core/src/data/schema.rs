//! Normalization of parsed tables into the canonical point schema.
//!
//! Program-native value names are renamed to `mf`/`sd`/`n`, network-wide
//! tables are filtered to one site, regional tables are reduced to one
//! region, and date parts become timestamps.

use crate::domain::{Frequency, MeasurementPoint, SeriesError, SiteSeries};
use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("column {column} has an unusable type: {reason}")]
    TypeMismatch { column: String, reason: String },

    #[error("invalid date at row {row}: {parts}")]
    InvalidDate { row: usize, parts: String },

    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// Native column names and their canonical equivalents, in priority order.
const RENAMES: &[(&str, &str)] = &[
    ("mr", "mf"),
    ("m", "mf"),
    ("conc", "mf"),
    ("msd", "sd"),
    ("stdev", "sd"),
    ("num", "n"),
];

/// Rename native value columns to `mf`, `sd` and `n`.
///
/// A canonical column already present is never overwritten.
pub fn canonicalize_columns(mut df: DataFrame) -> Result<DataFrame, SchemaError> {
    for (native, canonical) in RENAMES {
        if df.column(native).is_ok() && df.column(canonical).is_err() {
            df.rename(native, (*canonical).into())
                .map_err(|e| SchemaError::TypeMismatch {
                    column: (*native).to_string(),
                    reason: e.to_string(),
                })?;
        }
    }
    if df.column("mf").is_err() {
        return Err(SchemaError::MissingColumn("mf".into()));
    }
    Ok(df)
}

/// Program prefixes carried by regional column names.
const REGIONAL_PREFIXES: &[&str] = &["hats_", "gmd_", "gml_"];

/// Lowercased regional column name without program prefixes or the
/// `_{gas}` infix: `HATS_NH_F11_sd` becomes `nh_sd`.
pub fn regional_column_name(name: &str, gas: &str) -> String {
    let mut name = name.to_lowercase();
    for prefix in REGIONAL_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix) {
            name = rest.to_string();
        }
    }
    name.replace(&format!("_{}", gas.to_lowercase()), "")
}

/// Reduce a regional table to `region`'s value (as `mf`) and `_sd` (as `sd`).
pub fn select_region(df: DataFrame, gas: &str, region: &str) -> Result<DataFrame, SchemaError> {
    let region = region.to_lowercase();
    let sd_name = format!("{region}_sd");

    let mut columns: Vec<Column> = ["year", "month"]
        .iter()
        .filter_map(|part| df.column(part).ok().cloned())
        .collect();
    let mut mf = None;
    let mut sd = None;
    for column in df.get_columns() {
        let name = regional_column_name(column.name().as_str(), gas);
        if name == region {
            mf = Some(column.clone().with_name("mf".into()));
        } else if name == sd_name {
            sd = Some(column.clone().with_name("sd".into()));
        }
    }
    columns.push(mf.ok_or_else(|| SchemaError::MissingColumn(region.clone()))?);
    columns.extend(sd);

    DataFrame::new(columns).map_err(|e| SchemaError::TypeMismatch {
        column: region,
        reason: e.to_string(),
    })
}

/// Keep only rows for `site` when the table carries a site column.
pub fn filter_site(df: DataFrame, site: &str) -> Result<DataFrame, SchemaError> {
    if df.column("site").is_err() {
        return Ok(df);
    }
    df.lazy()
        .filter(col("site").eq(lit(site.to_lowercase())))
        .collect()
        .map_err(|e| SchemaError::TypeMismatch {
            column: "site".into(),
            reason: e.to_string(),
        })
}

fn int_column(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<i32>>>, SchemaError> {
    let Ok(column) = df.column(name) else {
        return Ok(None);
    };
    let cast = column
        .as_materialized_series()
        .cast(&DataType::Int32)
        .map_err(|e| SchemaError::TypeMismatch {
            column: name.to_string(),
            reason: e.to_string(),
        })?;
    let values = cast
        .i32()
        .map_err(|e| SchemaError::TypeMismatch {
            column: name.to_string(),
            reason: e.to_string(),
        })?
        .into_iter()
        .collect();
    Ok(Some(values))
}

fn float_column(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<f64>>>, SchemaError> {
    let Ok(column) = df.column(name) else {
        return Ok(None);
    };
    let cast = column
        .as_materialized_series()
        .cast(&DataType::Float64)
        .map_err(|e| SchemaError::TypeMismatch {
            column: name.to_string(),
            reason: e.to_string(),
        })?;
    let values = cast
        .f64()
        .map_err(|e| SchemaError::TypeMismatch {
            column: name.to_string(),
            reason: e.to_string(),
        })?
        .into_iter()
        .collect();
    Ok(Some(values))
}

/// Convert a parsed table into one site's series.
///
/// Monthly requests whose timestamps are not month-aligned (or that repeat
/// a timestamp, as flask events do) are resampled to monthly means. Other
/// cadences keep the first of any repeated timestamp.
pub fn normalize(df: DataFrame, site: &str, freq: Frequency) -> Result<SiteSeries, SchemaError> {
    let df = filter_site(canonicalize_columns(df)?, site)?;
    let rows = df.height();

    let year = int_column(&df, "year")?.ok_or_else(|| SchemaError::MissingColumn("year".into()))?;
    let month =
        int_column(&df, "month")?.ok_or_else(|| SchemaError::MissingColumn("month".into()))?;
    let day = int_column(&df, "day")?;
    let hour = int_column(&df, "hour")?;
    let minute = int_column(&df, "minute")?;
    let mf = float_column(&df, "mf")?.ok_or_else(|| SchemaError::MissingColumn("mf".into()))?;
    let sd = float_column(&df, "sd")?;
    let n = float_column(&df, "n")?;

    let part = |col: &Option<Vec<Option<i32>>>, i: usize, default: i32| {
        col.as_ref().map_or(Some(default), |v| v[i])
    };

    let mut points = Vec::with_capacity(rows);
    for i in 0..rows {
        let parts = (
            year[i],
            month[i],
            part(&day, i, 1),
            part(&hour, i, 0),
            part(&minute, i, 0),
        );
        let timestamp = match parts {
            (Some(y), Some(m), Some(d), Some(h), Some(mn)) => {
                NaiveDate::from_ymd_opt(y, m as u32, d as u32).and_then(|date| {
                    date.and_hms_opt(h as u32, mn as u32, 0)
                })
            }
            _ => None,
        }
        .ok_or_else(|| SchemaError::InvalidDate {
            row: i,
            parts: format!("{parts:?}"),
        })?;

        let count = n
            .as_ref()
            .and_then(|v| v[i])
            .filter(|c| c.is_finite() && *c >= 0.0)
            .map(|c| c.round() as u32);
        points.push(MeasurementPoint::new(
            timestamp,
            mf[i],
            sd.as_ref().and_then(|v| v[i]),
            count,
        ));
    }

    points.sort_by_key(|p| p.timestamp);
    let repeated = points.windows(2).any(|w| w[0].timestamp == w[1].timestamp);

    if freq == Frequency::Monthly {
        let aligned = points
            .iter()
            .all(|p| crate::domain::month_start(p.timestamp) == p.timestamp);
        if repeated || !aligned {
            debug!(site, rows, "resampling to monthly means");
            return Ok(SiteSeries::monthly_means(site, &points));
        }
    } else if repeated {
        let before = points.len();
        points.dedup_by_key(|p| p.timestamp);
        debug!(site, dropped = before - points.len(), "dropped repeated timestamps");
    }

    Ok(SiteSeries::new(site, points)?)
}
