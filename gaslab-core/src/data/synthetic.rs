//! Deterministic synthetic site data.
//!
//! Each (gas, site) pair gets its own RNG whose seed is derived with BLAKE3
//! from the master seed, so a site's series is identical no matter which
//! worker fetches it or in what order.

use super::provider::{FetchError, SiteFetcher, SiteRequest};
use crate::catalog::ProgramConfig;
use crate::domain::{add_months, month_timestamp, Frequency, MeasurementPoint, SiteSeries};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::f64::consts::PI;

#[derive(Debug, Clone)]
pub struct SyntheticFetcher {
    seed: u64,
    start_year: i32,
    months: usize,
    /// Probability that any single month is missing.
    gap_rate: f64,
    unavailable: BTreeSet<String>,
}

impl SyntheticFetcher {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            start_year: 2000,
            months: 120,
            gap_rate: 0.05,
            unavailable: BTreeSet::new(),
        }
    }

    pub fn with_span(mut self, start_year: i32, months: usize) -> Self {
        self.start_year = start_year;
        self.months = months;
        self
    }

    pub fn with_gap_rate(mut self, gap_rate: f64) -> Self {
        self.gap_rate = gap_rate.clamp(0.0, 1.0);
        self
    }

    /// Sites that answer every request with "not available".
    pub fn with_unavailable<I, S>(mut self, sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.unavailable
            .extend(sites.into_iter().map(|s| s.as_ref().to_lowercase()));
        self
    }

    fn sub_seed(&self, request: &SiteRequest) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(request.gas.as_str().as_bytes());
        hasher.update(request.site.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Monthly series: level + trend + annual cycle + noise, with scattered
    /// missing months and one multi-month outage.
    pub fn series(&self, request: &SiteRequest) -> SiteSeries {
        let mut rng = StdRng::seed_from_u64(self.sub_seed(request));
        let level = rng.gen_range(50.0..600.0);
        let trend = level * rng.gen_range(-0.002..0.004);
        let amplitude = level * rng.gen_range(0.002..0.01);
        let phase = rng.gen_range(0.0..2.0 * PI);
        let noise = level * 0.001;

        let outage_len = rng.gen_range(3..=8usize);
        let outage_start = if self.months > outage_len + 24 {
            rng.gen_range(12..self.months - outage_len - 12)
        } else {
            self.months
        };

        let Some(start) = month_timestamp(self.start_year, 1) else {
            return SiteSeries::empty(&request.site);
        };

        let points = (0..self.months)
            .filter_map(|i| {
                let ts = add_months(start, i as i64)?;
                let t = i as f64;
                let value = level
                    + trend * t
                    + amplitude * (2.0 * PI * t / 12.0 + phase).sin()
                    + rng.gen_range(-noise..=noise);
                let in_outage = (outage_start..outage_start + outage_len).contains(&i);
                let dropped = rng.gen_bool(self.gap_rate);
                let mf = (!in_outage && !dropped).then_some(value);
                let sd = mf.map(|_| noise * rng.gen_range(0.5..1.5));
                let n = mf.map(|_| rng.gen_range(20..200u32));
                Some(MeasurementPoint::new(ts, mf, sd, n))
            })
            .collect();

        SiteSeries::new(&request.site, points).unwrap_or_else(|_| SiteSeries::empty(&request.site))
    }
}

impl SiteFetcher for SyntheticFetcher {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        program: &ProgramConfig,
        request: &SiteRequest,
    ) -> Result<SiteSeries, FetchError> {
        program.validate(&request.gas, request.freq)?;
        if self.unavailable.contains(&request.site) {
            return Err(FetchError::NotAvailable {
                what: format!("synthetic {request}"),
            });
        }
        if request.freq != Frequency::Monthly {
            return Err(FetchError::NotAvailable {
                what: format!("synthetic {} data", request.freq),
            });
        }
        Ok(self.series(request))
    }
}
