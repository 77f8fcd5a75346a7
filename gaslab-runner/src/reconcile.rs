//! Multi-program reconciliation.
//!
//! Flattens program collections of one gas into a [`HarmonizedTable`], then
//! compares two programs site by site and as a cross-site mean.

use crate::collection::ProgramCollection;
use chrono::NaiveDateTime;
use gaslab_core::catalog::{GasId, ProgramId};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq)]
pub enum ReconcileError {
    #[error("cannot combine different gases: {first} and {second}")]
    GasMismatch { first: String, second: String },
}

/// Metadata carried next to a harmonized table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    pub gas: Option<GasId>,
    pub programs: Vec<ProgramId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarmonizedRow {
    pub date: NaiveDateTime,
    pub site: String,
    pub program: ProgramId,
    pub mf: Option<f64>,
    pub sd: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub elev: Option<f64>,
}

/// Rows of several programs, sorted by (program, site, date).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarmonizedTable {
    pub meta: TableMeta,
    pub rows: Vec<HarmonizedRow>,
}

impl HarmonizedTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Sites with at least one row from `program`.
    pub fn sites_of(&self, program: ProgramId) -> BTreeSet<&str> {
        self.rows
            .iter()
            .filter(|r| r.program == program)
            .map(|r| r.site.as_str())
            .collect()
    }

    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let dates: Vec<i64> = self
            .rows
            .iter()
            .map(|r| r.date.and_utc().timestamp_millis())
            .collect();
        let date = Series::new("date".into(), dates)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
        let sites: Vec<&str> = self.rows.iter().map(|r| r.site.as_str()).collect();
        let programs: Vec<&str> = self.rows.iter().map(|r| r.program.tag()).collect();
        let channel = |f: fn(&HarmonizedRow) -> Option<f64>| -> Vec<Option<f64>> {
            self.rows.iter().map(f).collect()
        };
        DataFrame::new(vec![
            Column::from(date),
            Column::new("site".into(), sites),
            Column::new("program".into(), programs),
            Column::new("mf".into(), channel(|r| r.mf)),
            Column::new("sd".into(), channel(|r| r.sd)),
            Column::new("lat".into(), channel(|r| r.lat)),
            Column::new("lon".into(), channel(|r| r.lon)),
            Column::new("elev".into(), channel(|r| r.elev)),
        ])
    }
}

/// Ratio of program A to program B at one site and date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioRow {
    pub date: NaiveDateTime,
    pub site: String,
    pub mf_a: f64,
    pub mf_b: f64,
    pub ratio: f64,
}

/// Cross-site mean ratio for one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioTrendRow {
    pub date: NaiveDateTime,
    pub mean_ratio: f64,
    pub n_sites: usize,
}

/// Flatten collections into one table tagged by program.
///
/// Forecast rows are left out. An empty list, or a list of empty
/// collections, gives an empty table.
pub fn flatten(collections: &[ProgramCollection]) -> Result<HarmonizedTable, ReconcileError> {
    let mut meta = TableMeta::default();
    let mut rows = Vec::new();

    for coll in collections {
        let gas = &coll.meta().gas;
        match &meta.gas {
            Some(first) if first != gas => {
                return Err(ReconcileError::GasMismatch {
                    first: first.to_string(),
                    second: gas.to_string(),
                })
            }
            Some(_) => {}
            None => meta.gas = Some(gas.clone()),
        }
        let program = coll.meta().program;
        if !meta.programs.contains(&program) {
            meta.programs.push(program);
        }
        rows.extend(coll.rows().into_iter().filter(|r| !r.is_forecast).map(|r| HarmonizedRow {
            date: r.date,
            site: r.site,
            program,
            mf: r.mf,
            sd: r.sd,
            lat: r.lat,
            lon: r.lon,
            elev: r.elev,
        }));
    }

    rows.sort_by(|x, y| (x.program, &x.site, x.date).cmp(&(y.program, &y.site, y.date)));
    debug!(rows = rows.len(), programs = meta.programs.len(), "flattened");
    Ok(HarmonizedTable { meta, rows })
}

fn program_values(table: &HarmonizedTable, program: ProgramId) -> BTreeMap<(&str, NaiveDateTime), f64> {
    table
        .rows
        .iter()
        .filter(|r| r.program == program)
        .filter_map(|r| Some(((r.site.as_str(), r.date), r.mf?)))
        .collect()
}

/// Per-site ratio series `a / b`, sorted by (site, date).
///
/// Only sites measured by both programs appear. Dates missing on either
/// side, null values and zero denominators produce no row.
pub fn site_ratios(table: &HarmonizedTable, a: ProgramId, b: ProgramId) -> Vec<RatioRow> {
    let (va, vb) = (program_values(table, a), program_values(table, b));
    let common: BTreeSet<&str> = table.sites_of(a).intersection(&table.sites_of(b)).copied().collect();

    va.iter()
        .filter(|((site, _), _)| common.contains(site))
        .filter_map(|(key, &mf_a)| {
            let mf_b = *vb.get(key)?;
            let ratio = mf_a / mf_b;
            ratio.is_finite().then(|| RatioRow {
                date: key.1,
                site: key.0.to_string(),
                mf_a,
                mf_b,
                ratio,
            })
        })
        .collect()
}

/// Mean ratio across sites for each date.
pub fn global_ratio_trend(ratios: &[RatioRow]) -> Vec<RatioTrendRow> {
    let mut by_date: BTreeMap<NaiveDateTime, (f64, usize)> = BTreeMap::new();
    for row in ratios {
        let slot = by_date.entry(row.date).or_insert((0.0, 0));
        slot.0 += row.ratio;
        slot.1 += 1;
    }
    by_date
        .into_iter()
        .map(|(date, (sum, n))| RatioTrendRow {
            date,
            mean_ratio: sum / n as f64,
            n_sites: n,
        })
        .collect()
}

/// Table, ratios and trend for one pair of programs.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub a: ProgramId,
    pub b: ProgramId,
    pub table: HarmonizedTable,
    pub ratios: Vec<RatioRow>,
    pub trend: Vec<RatioTrendRow>,
}

pub fn reconcile(
    collections: &[ProgramCollection],
    a: ProgramId,
    b: ProgramId,
) -> Result<Reconciliation, ReconcileError> {
    let table = flatten(collections)?;
    let ratios = site_ratios(&table, a, b);
    let trend = global_ratio_trend(&ratios);
    info!(
        a = %a,
        b = %b,
        sites = ratios.iter().map(|r| r.site.as_str()).collect::<BTreeSet<_>>().len(),
        ratios = ratios.len(),
        dates = trend.len(),
        "reconciled"
    );
    Ok(Reconciliation { a, b, table, ratios, trend })
}
