//! Site series: the ordered measurements of one site.
//!
//! A series is the unit every other component consumes: the orchestrator
//! assembles one per site, the gap-fill engine reads one at a time.

use super::point::{month_start, MeasurementPoint};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("timestamps for site '{site}' are not strictly increasing at {at}")]
    NotIncreasing { site: String, at: NaiveDateTime },

    #[error("duplicate timestamp {at} for site '{site}'")]
    DuplicateTimestamp { site: String, at: NaiveDateTime },
}

/// Span between the first and last non-null mole fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
}

impl ValidityWindow {
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.first && ts <= self.last
    }
}

/// Ordered measurements for one site, tagged with the lowercase site code.
///
/// Invariant: timestamps are strictly increasing (and therefore unique).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSeries {
    site: String,
    points: Vec<MeasurementPoint>,
}

impl SiteSeries {
    /// Build a series from points that are already in timestamp order.
    pub fn new(site: impl Into<String>, points: Vec<MeasurementPoint>) -> Result<Self, SeriesError> {
        let site = site.into().to_lowercase();
        for pair in points.windows(2) {
            if pair[1].timestamp == pair[0].timestamp {
                return Err(SeriesError::DuplicateTimestamp {
                    site,
                    at: pair[1].timestamp,
                });
            }
            if pair[1].timestamp < pair[0].timestamp {
                return Err(SeriesError::NotIncreasing {
                    site,
                    at: pair[1].timestamp,
                });
            }
        }
        Ok(Self { site, points })
    }

    /// Sort points by timestamp first. Duplicates are still an error.
    pub fn from_unsorted(
        site: impl Into<String>,
        mut points: Vec<MeasurementPoint>,
    ) -> Result<Self, SeriesError> {
        points.sort_by_key(|p| p.timestamp);
        Self::new(site, points)
    }

    pub fn empty(site: impl Into<String>) -> Self {
        Self {
            site: site.into().to_lowercase(),
            points: Vec::new(),
        }
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn points(&self) -> &[MeasurementPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<MeasurementPoint> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True when at least one point has a mole fraction.
    pub fn has_data(&self) -> bool {
        self.points.iter().any(|p| p.is_valid())
    }

    pub fn validity_window(&self) -> Option<ValidityWindow> {
        let first = self.points.iter().find(|p| p.is_valid())?.timestamp;
        let last = self.points.iter().rev().find(|p| p.is_valid())?.timestamp;
        Some(ValidityWindow { first, last })
    }

    /// Null points strictly inside the validity window.
    pub fn gap_count(&self) -> usize {
        match self.validity_window() {
            Some(window) => self
                .points
                .iter()
                .filter(|p| p.mf.is_none() && window.contains(p.timestamp))
                .count(),
            None => 0,
        }
    }

    /// Non-null mole fractions in timestamp order.
    pub fn observed_mf(&self) -> Vec<f64> {
        self.points.iter().filter_map(|p| p.mf).collect()
    }

    /// True when every timestamp is month-aligned.
    pub fn is_month_aligned(&self) -> bool {
        self.points.iter().all(|p| month_start(p.timestamp) == p.timestamp)
    }

    /// Aggregate onto month-start timestamps.
    ///
    /// `mf` and `sd` are the means of the non-null values in each month.
    /// `n` is the sum of reported counts, or the number of contributing
    /// mole fractions when no counts were reported.
    pub fn resample_monthly(&self) -> SiteSeries {
        Self::monthly_means(self.site.clone(), &self.points)
    }

    /// Monthly means of unordered points that may share timestamps, such as
    /// individual flask events.
    pub fn monthly_means(site: impl Into<String>, points: &[MeasurementPoint]) -> SiteSeries {
        #[derive(Default)]
        struct Bucket {
            mf_sum: f64,
            mf_count: u32,
            sd_sum: f64,
            sd_count: u32,
            n_sum: Option<u32>,
        }

        let mut buckets: BTreeMap<NaiveDateTime, Bucket> = BTreeMap::new();
        for p in points {
            let bucket = buckets.entry(month_start(p.timestamp)).or_default();
            if let Some(mf) = p.mf {
                bucket.mf_sum += mf;
                bucket.mf_count += 1;
            }
            if let Some(sd) = p.sd {
                bucket.sd_sum += sd;
                bucket.sd_count += 1;
            }
            if let Some(n) = p.n {
                bucket.n_sum = Some(bucket.n_sum.unwrap_or(0) + n);
            }
        }

        let points = buckets
            .into_iter()
            .map(|(timestamp, b)| {
                let mf = (b.mf_count > 0).then(|| b.mf_sum / f64::from(b.mf_count));
                let sd = (b.sd_count > 0).then(|| b.sd_sum / f64::from(b.sd_count));
                let n = b.n_sum.or((b.mf_count > 0).then_some(b.mf_count));
                MeasurementPoint::new(timestamp, mf, sd, n)
            })
            .collect();

        SiteSeries {
            site: site.into().to_lowercase(),
            points,
        }
    }
}
