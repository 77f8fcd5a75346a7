//! Whitespace-delimited text tables into polars DataFrames.
//!
//! Output columns are named by role: `year`, `month`, `day`, `hour`,
//! `minute` (Int32), `site` (String) and one Float64 column per value under
//! its program-native name. Compact `yyyymmdd` / `hhmm[ss]` tokens expand
//! into the same date-part columns.

use super::layout::{ColumnRole, TableLayout};
use polars::prelude::*;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("table has no data rows")]
    Empty,

    #[error("table construction failed: {0}")]
    Table(String),
}

const DATE_PARTS: [&str; 5] = ["year", "month", "day", "hour", "minute"];

/// Columns accumulated row by row.
#[derive(Default)]
struct Columns {
    parts: [Vec<i32>; 5],
    has_part: [bool; 5],
    site: Vec<String>,
    has_site: bool,
    values: Vec<(String, Vec<Option<f64>>)>,
}

impl Columns {
    fn for_roles(roles: &[ColumnRole], header: Option<&[&str]>) -> Result<Self, String> {
        let mut cols = Columns::default();
        for (pos, role) in roles.iter().enumerate() {
            match role {
                ColumnRole::Year => cols.has_part[0] = true,
                ColumnRole::Month => cols.has_part[1] = true,
                ColumnRole::Day => cols.has_part[2] = true,
                ColumnRole::Hour => cols.has_part[3] = true,
                ColumnRole::Minute => cols.has_part[4] = true,
                ColumnRole::CompactDate => cols.has_part[..3].fill(true),
                ColumnRole::CompactTime => cols.has_part[3..].fill(true),
                ColumnRole::Site => cols.has_site = true,
                ColumnRole::Value(name) => cols.values.push((name.to_string(), Vec::new())),
                ColumnRole::Rest => {
                    let names = header
                        .and_then(|h| h.get(pos..))
                        .filter(|names| !names.is_empty())
                        .ok_or("trailing columns need a header line naming them")?;
                    cols.values
                        .extend(names.iter().map(|name| (name.to_string(), Vec::new())));
                }
                ColumnRole::Skip => {}
            }
        }
        Ok(cols)
    }

    fn rows(&self) -> usize {
        self.values
            .first()
            .map(|(_, v)| v.len())
            .or_else(|| self.has_site.then_some(self.site.len()))
            .unwrap_or_else(|| self.parts[0].len())
    }

    fn into_frame(self) -> Result<DataFrame, ParseError> {
        let mut columns = Vec::new();
        for (i, name) in DATE_PARTS.iter().enumerate() {
            if self.has_part[i] {
                columns.push(Column::new((*name).into(), &self.parts[i]));
            }
        }
        if self.has_site {
            columns.push(Column::new("site".into(), &self.site));
        }
        for (name, values) in &self.values {
            columns.push(Column::new(name.as_str().into(), values));
        }
        DataFrame::new(columns).map_err(|e| ParseError::Table(e.to_string()))
    }
}

/// One parsed row, held until the whole row is known to be valid.
struct Row {
    parts: [Option<i32>; 5],
    site: Option<String>,
    values: Vec<Option<f64>>,
}

fn parse_int(token: &str) -> Option<i32> {
    token.parse::<i32>().ok()
}

fn parse_compact_date(token: &str) -> Option<(i32, i32, i32)> {
    if token.len() != 8 {
        return None;
    }
    let v = parse_int(token)?;
    Some((v / 10_000, (v / 100) % 100, v % 100))
}

fn parse_compact_time(token: &str) -> Option<(i32, i32)> {
    let v = parse_int(token)?;
    if token.len() > 4 {
        Some((v / 10_000, (v / 100) % 100))
    } else {
        Some((v / 100, v % 100))
    }
}

fn parse_row(tokens: &[&str], roles: &[ColumnRole], layout: &TableLayout) -> Result<Row, String> {
    let mut row = Row {
        parts: [None; 5],
        site: None,
        values: Vec::new(),
    };

    for (pos, (role, token)) in roles.iter().zip(tokens).enumerate() {
        let bad = || format!("cannot read '{token}' as {role:?}");
        match role {
            ColumnRole::Year => row.parts[0] = Some(parse_int(token).ok_or_else(bad)?),
            ColumnRole::Month => row.parts[1] = Some(parse_int(token).ok_or_else(bad)?),
            ColumnRole::Day => row.parts[2] = Some(parse_int(token).ok_or_else(bad)?),
            ColumnRole::Hour => row.parts[3] = Some(parse_int(token).ok_or_else(bad)?),
            ColumnRole::Minute => row.parts[4] = Some(parse_int(token).ok_or_else(bad)?),
            ColumnRole::CompactDate => {
                let (y, m, d) = parse_compact_date(token).ok_or_else(bad)?;
                row.parts[0] = Some(y);
                row.parts[1] = Some(m);
                row.parts[2] = Some(d);
            }
            ColumnRole::CompactTime => {
                let (h, mn) = parse_compact_time(token).ok_or_else(bad)?;
                row.parts[3] = Some(h);
                row.parts[4] = Some(mn);
            }
            ColumnRole::Site => row.site = Some(token.to_lowercase()),
            ColumnRole::Value(_) => row.values.push(parse_value(token, layout).ok_or_else(bad)?),
            ColumnRole::Rest => {
                for token in &tokens[pos..] {
                    let value = parse_value(token, layout)
                        .ok_or_else(|| format!("cannot read '{token}' as a value"))?;
                    row.values.push(value);
                }
            }
            ColumnRole::Skip => {}
        }
    }
    Ok(row)
}

/// `Some(None)` for a missing value, `None` when the token is not a number.
fn parse_value(token: &str, layout: &TableLayout) -> Option<Option<f64>> {
    if layout.is_na(token) {
        return Some(None);
    }
    let v: f64 = token.parse().ok()?;
    Some(Some(v).filter(|v| v.is_finite()))
}

/// Parse `text` according to `layout`.
///
/// Lines starting with the comment character and blank lines are ignored.
/// Unparseable lines before the first data row are treated as header lines;
/// after it they are errors. The column set is fixed by the first data row.
pub fn parse_table(text: &str, layout: &TableLayout) -> Result<DataFrame, ParseError> {
    let mut roles: Option<&[ColumnRole]> = None;
    let mut cols = Columns::default();
    let mut header: Option<Vec<&str>> = None;

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(c) = layout.comment {
            if trimmed.starts_with(c) {
                continue;
            }
        }
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();

        let active = match roles {
            Some(r) => r,
            None => match layout.variant_for(tokens.len()) {
                Some(r) => r,
                None => {
                    header = Some(tokens);
                    continue;
                }
            },
        };

        if tokens.len() < active.len() {
            if roles.is_none() {
                header = Some(tokens);
                continue;
            }
            return Err(ParseError::Malformed {
                line: idx + 1,
                reason: format!("expected {} columns, found {}", active.len(), tokens.len()),
            });
        }

        let row = match parse_row(&tokens, active, layout) {
            Ok(row) => row,
            Err(_) if roles.is_none() => {
                header = Some(tokens);
                continue;
            }
            Err(reason) => {
                return Err(ParseError::Malformed {
                    line: idx + 1,
                    reason,
                })
            }
        };

        if roles.is_none() {
            roles = Some(active);
            cols = Columns::for_roles(active, header.as_deref()).map_err(|reason| {
                ParseError::Malformed {
                    line: idx + 1,
                    reason,
                }
            })?;
        }
        if row.values.len() != cols.values.len() {
            return Err(ParseError::Malformed {
                line: idx + 1,
                reason: format!(
                    "expected {} values, found {}",
                    cols.values.len(),
                    row.values.len()
                ),
            });
        }
        for (i, part) in row.parts.iter().enumerate() {
            if let Some(v) = part {
                cols.parts[i].push(*v);
            }
        }
        if let Some(site) = row.site {
            cols.site.push(site);
        }
        for ((_, column), value) in cols.values.iter_mut().zip(row.values) {
            column.push(value);
        }
    }

    if roles.is_none() || cols.rows() == 0 {
        return Err(ParseError::Empty);
    }
    cols.into_frame()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_column(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn monthly_insitu_with_header_and_comments() {
        let text = "# CATS N2O at BRW\n\
                    # contact: someone\n\
                    yyyy mm N2O sd n\n\
                    1999 01 315.2 0.4 120\n\
                    1999 02 nan 0.5 0\n\
                    1999 03 315.6 0.3 118\n";
        let df = parse_table(text, &TableLayout::insitu_monthly()).unwrap();
        assert_eq!(df.height(), 3);
        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, ["year", "month", "mr", "sd", "n"]);
        let mr = f64_column(&df, "mr");
        assert_eq!(mr, vec![Some(315.2), None, Some(315.6)]);
    }

    #[test]
    fn four_value_monthly_variant_by_width() {
        let text = "2010 06 520.1 1.2 0.8 300\n2010 07 521.0 1.1 0.7 290\n";
        let df = parse_table(text, &TableLayout::insitu_monthly()).unwrap();
        assert!(df.column("unc").is_ok());
        assert_eq!(f64_column(&df, "sd"), vec![Some(0.8), Some(0.7)]);
    }

    #[test]
    fn hourly_nan_token_is_null() {
        let text = "2001 01 01 00 00 Nan Nan\n2001 01 01 01 00 262.3 0.9\n";
        let df = parse_table(text, &TableLayout::insitu_hourly()).unwrap();
        assert_eq!(f64_column(&df, "mr"), vec![None, Some(262.3)]);
        let hours: Vec<Option<i32>> = df
            .column("hour")
            .unwrap()
            .as_materialized_series()
            .i32()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(hours, vec![Some(0), Some(1)]);
    }

    #[test]
    fn flask_pairs_compact_dates_and_sites() {
        let text = "header line describing file\n\
                    BRW 2004.0411 20040115 1130 270 5.1 543.2 1.1\n\
                    brw 2004.0438 20040116 013000 nd nd 0.0 nd\n";
        let df = parse_table(text, &TableLayout::flask_pairs()).unwrap();
        assert_eq!(df.height(), 2);
        let sites: Vec<Option<&str>> = df
            .column("site")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(sites, vec![Some("brw"), Some("brw")]);
        assert_eq!(f64_column(&df, "mf"), vec![Some(543.2), None]);
    }

    #[test]
    fn combined_values_are_named_by_header() {
        let text = "# global means\n\
                    HATS_F11_YYYY HATS_F11_MM HATS_NH_F11 HATS_NH_F11_sd HATS_Global_F11 HATS_Global_F11_sd\n\
                    1992 01 268.1 0.9 265.0 0.7\n\
                    1992 02 nan nan 265.3 0.6\n";
        let df = parse_table(text, &TableLayout::combined()).unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            [
                "year",
                "month",
                "HATS_NH_F11",
                "HATS_NH_F11_sd",
                "HATS_Global_F11",
                "HATS_Global_F11_sd"
            ]
        );
        assert_eq!(f64_column(&df, "HATS_NH_F11"), vec![Some(268.1), None]);
    }

    #[test]
    fn combined_without_header_is_error() {
        let err = parse_table("1992 01 268.1 0.9\n", &TableLayout::combined()).unwrap_err();
        assert!(matches!(err, ParseError::Malformed { line: 1, .. }));
    }

    #[test]
    fn combined_row_width_must_match_header() {
        let text = "yyyy mm NH NH_sd\n1992 01 268.1 0.9\n1992 02 268.3\n";
        let err = parse_table(text, &TableLayout::combined()).unwrap_err();
        assert!(matches!(err, ParseError::Malformed { line: 3, .. }));
    }

    #[test]
    fn malformed_row_after_data_is_error() {
        let text = "1999 01 315.2 0.4 120\n1999 xx 315.2 0.4 120\n";
        let err = parse_table(text, &TableLayout::insitu_monthly()).unwrap_err();
        assert!(matches!(err, ParseError::Malformed { line: 2, .. }));
    }

    #[test]
    fn short_row_after_data_is_error() {
        let text = "1999 01 315.2 0.4 120\n1999 02\n";
        let err = parse_table(text, &TableLayout::insitu_monthly()).unwrap_err();
        assert!(matches!(err, ParseError::Malformed { line: 2, .. }));
    }

    #[test]
    fn comments_only_is_empty() {
        let err = parse_table("# nothing\n\n", &TableLayout::flask_monthly()).unwrap_err();
        assert_eq!(err, ParseError::Empty);
    }
}
