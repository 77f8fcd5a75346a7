//! Program Collection: the merged per-site output of one load.
//!
//! The metadata record ([`CollectionMeta`]) travels next to the data rather
//! than being attached to a table. Rows are always produced in (site, date)
//! order so that output never depends on which worker finished first.

use chrono::NaiveDateTime;
use gaslab_core::catalog::{GasId, ProgramId, SiteLocation};
use gaslab_core::domain::{Frequency, SiteSeries};
use gaslab_core::gapfill::{FillOutcome, FillStrategy, GapFillResult};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a collection holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub gas: GasId,
    pub program: ProgramId,
    pub freq: Frequency,
    /// Strategy applied when the collection was gap-filled.
    pub gapfill: Option<FillStrategy>,
}

/// One site's data, either as fetched or after gap-filling.
#[derive(Debug, Clone, PartialEq)]
pub enum SiteData {
    Raw(SiteSeries),
    Filled(GapFillResult),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteEntry {
    pub data: SiteData,
    pub location: Option<SiteLocation>,
}

/// One output row.
///
/// `mf` is the filled value for gap-filled collections and the observed
/// value otherwise. Forecast rows have `mf_raw = None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRow {
    pub date: NaiveDateTime,
    pub site: String,
    pub mf: Option<f64>,
    pub mf_raw: Option<f64>,
    pub sd: Option<f64>,
    pub model: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub elev: Option<f64>,
    #[serde(skip)]
    pub is_forecast: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramCollection {
    meta: CollectionMeta,
    sites: BTreeMap<String, SiteEntry>,
    with_location: bool,
}

impl ProgramCollection {
    pub fn new(meta: CollectionMeta) -> Self {
        Self {
            meta,
            sites: BTreeMap::new(),
            with_location: false,
        }
    }

    pub fn meta(&self) -> &CollectionMeta {
        &self.meta
    }

    pub fn insert(&mut self, site: impl Into<String>, entry: SiteEntry) {
        self.sites.insert(site.into(), entry);
    }

    /// Mark the collection as location-enriched; output rows then carry
    /// `lat`/`lon`/`elev` columns (null for unknown sites).
    pub fn set_location_enriched(&mut self, enriched: bool) {
        self.with_location = enriched;
    }

    pub fn is_location_enriched(&self) -> bool {
        self.with_location
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Site codes in sorted order.
    pub fn sites(&self) -> Vec<&str> {
        self.sites.keys().map(String::as_str).collect()
    }

    pub fn get(&self, site: &str) -> Option<&SiteEntry> {
        self.sites.get(site)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &SiteEntry)> {
        self.sites.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = (&String, &mut SiteEntry)> {
        self.sites.iter_mut()
    }

    /// Fill outcome per gap-filled site.
    pub fn outcomes(&self) -> BTreeMap<&str, &FillOutcome> {
        self.sites
            .iter()
            .filter_map(|(site, entry)| match &entry.data {
                SiteData::Filled(result) => Some((site.as_str(), result.outcome())),
                SiteData::Raw(_) => None,
            })
            .collect()
    }

    /// All rows, sorted by (site, date).
    pub fn rows(&self) -> Vec<OutputRow> {
        let mut rows = Vec::new();
        for (site, entry) in &self.sites {
            let loc = if self.with_location { entry.location } else { None };
            let row = |date, mf, mf_raw, sd, model, is_forecast| OutputRow {
                date,
                site: site.clone(),
                mf,
                mf_raw,
                sd,
                model,
                lat: loc.map(|l| l.lat),
                lon: loc.map(|l| l.lon),
                elev: loc.map(|l| l.elev),
                is_forecast,
            };
            match &entry.data {
                SiteData::Raw(series) => rows.extend(
                    series
                        .points()
                        .iter()
                        .map(|p| row(p.timestamp, p.mf, p.mf, p.sd, None, false)),
                ),
                SiteData::Filled(result) => rows.extend(result.points().iter().map(|p| {
                    row(p.timestamp, p.mf, p.mf_raw, p.sd, p.model, p.is_forecast)
                })),
            }
        }
        rows
    }

    pub fn row_count(&self) -> usize {
        self.sites
            .values()
            .map(|e| match &e.data {
                SiteData::Raw(s) => s.len(),
                SiteData::Filled(r) => r.len(),
            })
            .sum()
    }

    /// Rows as a polars frame with a millisecond `date` column.
    ///
    /// The `model` column is present only for gap-filled collections and the
    /// location columns only for enriched ones.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let rows = self.rows();
        let dates: Vec<i64> = rows
            .iter()
            .map(|r| r.date.and_utc().timestamp_millis())
            .collect();
        let date = Series::new("date".into(), dates)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
        let sites: Vec<&str> = rows.iter().map(|r| r.site.as_str()).collect();
        let channel = |f: fn(&OutputRow) -> Option<f64>| -> Vec<Option<f64>> { rows.iter().map(f).collect() };

        let mut columns = vec![
            Column::from(date),
            Column::new("site".into(), sites),
            Column::new("mf".into(), channel(|r| r.mf)),
            Column::new("mf_raw".into(), channel(|r| r.mf_raw)),
            Column::new("sd".into(), channel(|r| r.sd)),
        ];
        if self.meta.gapfill.is_some() {
            columns.push(Column::new("model".into(), channel(|r| r.model)));
        }
        if self.with_location {
            columns.push(Column::new("lat".into(), channel(|r| r.lat)));
            columns.push(Column::new("lon".into(), channel(|r| r.lon)));
            columns.push(Column::new("elev".into(), channel(|r| r.elev)));
        }
        DataFrame::new(columns)
    }

    /// Deterministic BLAKE3 hash over the metadata and sorted rows.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.meta.gas.as_str().as_bytes());
        hasher.update(self.meta.program.tag().as_bytes());
        hasher.update(self.meta.freq.as_str().as_bytes());
        for row in self.rows() {
            hasher.update(row.site.as_bytes());
            hasher.update(row.date.to_string().as_bytes());
            for value in [row.mf, row.mf_raw, row.sd, row.model, row.lat, row.lon, row.elev] {
                match value {
                    Some(v) => hasher.update(&v.to_le_bytes()),
                    None => hasher.update(b"null"),
                };
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}
