//! CSV and JSON export of collections and reconciliations.
//!
//! Dates are written as `YYYY-MM-DD` (with a time for sub-daily data) and
//! missing values as empty fields.

use crate::collection::ProgramCollection;
use crate::reconcile::{HarmonizedTable, RatioRow, RatioTrendRow, Reconciliation};
use chrono::NaiveDateTime;
use gaslab_core::catalog::ProgramId;
use gaslab_core::domain::Frequency;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },
}

fn io_error(path: &Path, err: impl std::fmt::Display) -> ExportError {
    ExportError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

fn fmt_date(date: NaiveDateTime, freq: Frequency) -> String {
    match freq {
        Frequency::Hourly => date.format("%Y-%m-%d %H:%M").to_string(),
        _ => date.format("%Y-%m-%d").to_string(),
    }
}

fn fmt_value(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr.into_inner().map_err(|e| io_error(Path::new("<buffer>"), e.error()))?;
    String::from_utf8(data).map_err(|e| io_error(Path::new("<buffer>"), e))
}

// ─── CSV ────────────────────────────────────────────────────────────

/// One collection as CSV.
///
/// Columns: date, site, mf, mf_raw, sd, then `model` for gap-filled
/// collections and lat, lon, elev for location-enriched ones.
pub fn collection_csv(collection: &ProgramCollection) -> Result<String, ExportError> {
    let filled = collection.meta().gapfill.is_some();
    let located = collection.is_location_enriched();
    let freq = collection.meta().freq;

    let mut header = vec!["date", "site", "mf", "mf_raw", "sd"];
    if filled {
        header.push("model");
    }
    if located {
        header.extend(["lat", "lon", "elev"]);
    }

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(&header)?;
    for row in collection.rows() {
        let mut record = vec![
            fmt_date(row.date, freq),
            row.site,
            fmt_value(row.mf),
            fmt_value(row.mf_raw),
            fmt_value(row.sd),
        ];
        if filled {
            record.push(fmt_value(row.model));
        }
        if located {
            record.extend([fmt_value(row.lat), fmt_value(row.lon), fmt_value(row.elev)]);
        }
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

pub fn table_csv(table: &HarmonizedTable) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "site", "program", "mf", "sd", "lat", "lon", "elev"])?;
    for r in &table.rows {
        wtr.write_record([
            &fmt_date(r.date, Frequency::Monthly),
            &r.site,
            &r.program.tag().to_string(),
            &fmt_value(r.mf),
            &fmt_value(r.sd),
            &fmt_value(r.lat),
            &fmt_value(r.lon),
            &fmt_value(r.elev),
        ])?;
    }
    finish(wtr)
}

pub fn ratios_csv(ratios: &[RatioRow]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "site", "mf_a", "mf_b", "ratio"])?;
    for r in ratios {
        wtr.write_record([
            &fmt_date(r.date, Frequency::Monthly),
            &r.site,
            &r.mf_a.to_string(),
            &r.mf_b.to_string(),
            &format!("{:.6}", r.ratio),
        ])?;
    }
    finish(wtr)
}

pub fn trend_csv(trend: &[RatioTrendRow]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "mean_ratio", "n_sites"])?;
    for r in trend {
        wtr.write_record([
            &fmt_date(r.date, Frequency::Monthly),
            &format!("{:.6}", r.mean_ratio),
            &r.n_sites.to_string(),
        ])?;
    }
    finish(wtr)
}

// ─── Files ──────────────────────────────────────────────────────────

fn write_file(path: &Path, content: &str) -> Result<(), ExportError> {
    std::fs::write(path, content).map_err(|e| io_error(path, e))
}

pub fn write_collection(path: &Path, collection: &ProgramCollection) -> Result<(), ExportError> {
    write_file(path, &collection_csv(collection)?)
}

#[derive(Serialize)]
struct ComparisonManifest<'a> {
    gas: Option<&'a str>,
    programs: Vec<ProgramId>,
    numerator: ProgramId,
    denominator: ProgramId,
    rows: usize,
    ratio_rows: usize,
    trend_rows: usize,
}

/// Write a reconciliation into `dir` and return the files written.
///
/// Every file name carries the `{a}_{b}` pair, so several pairs can share
/// one directory: `manifest_{a}_{b}.json`, `harmonized_{a}_{b}.csv`,
/// `ratios_{a}_{b}.csv` and `trend_{a}_{b}.csv`.
pub fn save_reconciliation(rec: &Reconciliation, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    std::fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
    let pair = format!("{}_{}", rec.a.tag(), rec.b.tag());

    let manifest = ComparisonManifest {
        gas: rec.table.meta.gas.as_ref().map(|g| g.as_str()),
        programs: rec.table.meta.programs.clone(),
        numerator: rec.a,
        denominator: rec.b,
        rows: rec.table.len(),
        ratio_rows: rec.ratios.len(),
        trend_rows: rec.trend.len(),
    };

    let files = [
        (format!("manifest_{pair}.json"), serde_json::to_string_pretty(&manifest)?),
        (format!("harmonized_{pair}.csv"), table_csv(&rec.table)?),
        (format!("ratios_{pair}.csv"), ratios_csv(&rec.ratios)?),
        (format!("trend_{pair}.csv"), trend_csv(&rec.trend)?),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (name, content) in files {
        let path = dir.join(name);
        write_file(&path, &content)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{CollectionMeta, SiteData, SiteEntry};
    use crate::reconcile::reconcile;
    use gaslab_core::catalog::{GasId, SiteLocation};
    use gaslab_core::domain::{month_timestamp, MeasurementPoint, SiteSeries};

    fn collection(program: ProgramId, site: &str, values: &[Option<f64>]) -> ProgramCollection {
        let mut coll = ProgramCollection::new(CollectionMeta {
            gas: GasId::parse("F12").unwrap(),
            program,
            freq: Frequency::Monthly,
            gapfill: None,
        });
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| MeasurementPoint::new(month_timestamp(2020, i as u32 + 1).unwrap(), *v, None, None))
            .collect();
        coll.insert(
            site,
            SiteEntry {
                data: SiteData::Raw(SiteSeries::new(site, points).unwrap()),
                location: Some(SiteLocation { lat: 1.0, lon: 2.0, elev: 3.0 }),
            },
        );
        coll
    }

    #[test]
    fn collection_csv_writes_nulls_as_empty() {
        let coll = collection(ProgramId::Cats, "brw", &[Some(500.5), None]);
        let csv = collection_csv(&coll).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "date,site,mf,mf_raw,sd");
        assert_eq!(lines[1], "2020-01-01,brw,500.5,500.5,");
        assert_eq!(lines[2], "2020-02-01,brw,,,");
    }

    #[test]
    fn location_columns_follow_enrichment() {
        let mut coll = collection(ProgramId::Cats, "brw", &[Some(1.0)]);
        coll.set_location_enriched(true);
        let csv = collection_csv(&coll).unwrap();
        assert!(csv.starts_with("date,site,mf,mf_raw,sd,lat,lon,elev\n"));
        assert!(csv.contains(",1,2,3"));
    }

    #[test]
    fn save_reconciliation_writes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = collection(ProgramId::Cats, "brw", &[Some(4.0)]);
        let b = collection(ProgramId::Otto, "brw", &[Some(2.0)]);
        let rec = reconcile(&[a, b], ProgramId::Cats, ProgramId::Otto).unwrap();

        let written = save_reconciliation(&rec, &dir.path().join("out")).unwrap();
        assert_eq!(written.len(), 4);
        for path in &written {
            assert!(path.exists(), "{} missing", path.display());
        }

        let ratios = std::fs::read_to_string(dir.path().join("out/ratios_cats_otto.csv")).unwrap();
        assert!(ratios.contains("2020-01-01,brw,4,2,2.000000"));

        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("out/manifest_cats_otto.json")).unwrap()).unwrap();
        assert_eq!(manifest["gas"], "F12");
        assert_eq!(manifest["numerator"], "cats");
    }

    #[test]
    fn pairs_sharing_a_directory_keep_their_own_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let collections = [
            collection(ProgramId::Cats, "brw", &[Some(4.0)]),
            collection(ProgramId::Otto, "brw", &[Some(2.0)]),
            collection(ProgramId::Rits, "brw", &[Some(1.0)]),
        ];
        for (a, b) in [(ProgramId::Cats, ProgramId::Otto), (ProgramId::Cats, ProgramId::Rits)] {
            let rec = reconcile(&collections, a, b).unwrap();
            save_reconciliation(&rec, &out).unwrap();
        }

        let read_manifest = |name: &str| -> serde_json::Value {
            serde_json::from_str(&std::fs::read_to_string(out.join(name)).unwrap()).unwrap()
        };
        assert_eq!(read_manifest("manifest_cats_otto.json")["denominator"], "otto");
        assert_eq!(read_manifest("manifest_cats_rits.json")["denominator"], "rits");
        assert!(out.join("harmonized_cats_otto.csv").exists());
        assert!(out.join("harmonized_cats_rits.csv").exists());
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 8);
    }
}
