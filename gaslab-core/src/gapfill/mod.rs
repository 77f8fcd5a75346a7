//! Gap-fill engine.
//!
//! Given one site's series, [`fill`] produces a [`GapFillResult`] with a
//! filled channel, a modeled channel and an optional forecast extension.
//! Three strategies are available:
//!
//! - `linear`: time-weighted interpolation inside the validity window.
//! - `seasonal`: additive Holt–Winters fitted to the linearly pre-filled
//!   window. A failed fit falls back to `linear` for that site.
//! - `robust_seasonal`: `seasonal` plus a divergence check that may refit on
//!   the time-reversed series.
//!
//! The engine never returns an error. Every terminal state is recorded in
//! [`FillOutcome`], and observed values always pass through unchanged.

pub mod grid;
pub mod holt_winters;
pub mod linear;
pub mod optimize;
pub mod robust;
pub mod seasonal;

pub use holt_winters::{FitError, HoltWintersFit, SmoothingParams};

use crate::domain::{add_months, MeasurementPoint, SiteSeries, ValidityWindow};
use chrono::NaiveDateTime;
use grid::MonthGrid;
use linear::median;
use seasonal::{linear_channels, seasonal_channels, Channels};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStrategy {
    Linear,
    Seasonal,
    RobustSeasonal,
}

impl FillStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FillStrategy::Linear => "linear",
            FillStrategy::Seasonal => "seasonal",
            FillStrategy::RobustSeasonal => "robust_seasonal",
        }
    }
}

impl fmt::Display for FillStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FillStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "linear" => Ok(FillStrategy::Linear),
            "seasonal" | "holt_winters" | "hw" => Ok(FillStrategy::Seasonal),
            "robust_seasonal" | "robust" => Ok(FillStrategy::RobustSeasonal),
            other => Err(format!(
                "unknown fill strategy '{other}' (expected linear, seasonal or robust_seasonal)"
            )),
        }
    }
}

/// Engine parameters.
///
/// `warmup_periods` and `divergence_sigma` are empirical heuristics; the
/// defaults reproduce the long-standing behaviour (16 months, 2 sigma).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapFillConfig {
    pub strategy: FillStrategy,
    pub seasonal_periods: usize,
    pub forecast_periods: usize,
    /// Leading model outputs treated as unmodeled.
    pub warmup_periods: usize,
    pub divergence_sigma: f64,
    /// Optimizer iteration cap for the smoothing parameters.
    pub max_iterations: usize,
}

impl Default for GapFillConfig {
    fn default() -> Self {
        Self {
            strategy: FillStrategy::RobustSeasonal,
            seasonal_periods: 12,
            forecast_periods: 0,
            warmup_periods: 16,
            divergence_sigma: 2.0,
            max_iterations: 1000,
        }
    }
}

impl GapFillConfig {
    pub fn new(strategy: FillStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn with_forecast(mut self, periods: usize) -> Self {
        self.forecast_periods = periods;
        self
    }

    pub fn with_seasonal_periods(mut self, periods: usize) -> Self {
        self.seasonal_periods = periods;
        self
    }

    pub fn with_warmup(mut self, periods: usize) -> Self {
        self.warmup_periods = periods;
        self
    }

    pub fn with_divergence_sigma(mut self, sigma: f64) -> Self {
        self.divergence_sigma = sigma;
        self
    }
}

/// Terminal state of one site's fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FillOutcome {
    /// No non-null mole fraction at all.
    NoData,
    Linear,
    Seasonal,
    /// The seasonal fit failed; the linear fill was used instead.
    LinearFallback { reason: FitError },
    /// The forward fill diverged and the reversed fit replaced it.
    ReversedFit,
    /// The forward fill diverged but the reversed fit was no improvement.
    DivergenceForwardKept,
}

impl FillOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FillOutcome::NoData => "no_data",
            FillOutcome::Linear => "linear",
            FillOutcome::Seasonal => "seasonal",
            FillOutcome::LinearFallback { .. } => "linear_fallback",
            FillOutcome::ReversedFit => "reversed_fit",
            FillOutcome::DivergenceForwardKept => "divergence_forward_kept",
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, FillOutcome::LinearFallback { .. })
    }
}

/// One output row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilledPoint {
    pub timestamp: NaiveDateTime,
    /// Observed mole fraction.
    pub mf_raw: Option<f64>,
    /// Observed value where present, otherwise model, otherwise interpolation.
    pub mf: Option<f64>,
    pub model: Option<f64>,
    pub sd: Option<f64>,
    pub n: Option<u32>,
    pub is_forecast: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapFillResult {
    site: String,
    strategy: FillStrategy,
    outcome: FillOutcome,
    window: Option<ValidityWindow>,
    points: Vec<FilledPoint>,
}

impl GapFillResult {
    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn strategy(&self) -> FillStrategy {
        self.strategy
    }

    pub fn outcome(&self) -> &FillOutcome {
        &self.outcome
    }

    pub fn window(&self) -> Option<ValidityWindow> {
        self.window
    }

    pub fn points(&self) -> &[FilledPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Rows appended past the last observed month.
    pub fn forecast_extension(&self) -> &[FilledPoint] {
        let start = self
            .points
            .iter()
            .position(|p| p.is_forecast)
            .unwrap_or(self.points.len());
        &self.points[start..]
    }

    /// Filled values as a series, forecast rows excluded.
    pub fn to_filled_series(&self) -> SiteSeries {
        let points = self
            .points
            .iter()
            .filter(|p| !p.is_forecast)
            .map(|p| MeasurementPoint::new(p.timestamp, p.mf, p.sd, p.n))
            .collect();
        SiteSeries::new(&self.site, points).unwrap_or_else(|_| SiteSeries::empty(&self.site))
    }
}

/// Build output rows from grid channels.
///
/// With a non-empty forecast, rows after the window are replaced by exactly
/// `forecast.len()` forecast rows.
fn assemble(
    site: &str,
    grid: &MonthGrid,
    window: (usize, usize),
    channels: Channels,
    forecast: &[f64],
    strategy: FillStrategy,
    outcome: FillOutcome,
) -> GapFillResult {
    let (first, last) = window;
    let sd_observed: Vec<f64> = grid.sd.iter().flatten().copied().collect();
    let sd_fill = median(&sd_observed);

    let keep = if forecast.is_empty() { grid.len() } else { last + 1 };
    let mut points: Vec<FilledPoint> = (0..keep)
        .map(|i| {
            let inside = (first..=last).contains(&i);
            FilledPoint {
                timestamp: grid.timestamps[i],
                mf_raw: grid.mf[i],
                mf: channels.filled[i],
                model: channels.model[i],
                sd: if inside { grid.sd[i].or(sd_fill) } else { None },
                n: grid.n[i],
                is_forecast: false,
            }
        })
        .collect();

    let last_ts = grid.timestamps[last];
    points.extend(forecast.iter().enumerate().filter_map(|(h, value)| {
        Some(FilledPoint {
            timestamp: add_months(last_ts, h as i64 + 1)?,
            mf_raw: None,
            mf: Some(*value),
            model: Some(*value),
            sd: None,
            n: None,
            is_forecast: true,
        })
    }));

    GapFillResult {
        site: site.to_string(),
        strategy,
        outcome,
        window: Some(ValidityWindow {
            first: grid.timestamps[first],
            last: last_ts,
        }),
        points,
    }
}

fn no_data(site: &str, grid: &MonthGrid, strategy: FillStrategy) -> GapFillResult {
    let points = (0..grid.len())
        .map(|i| FilledPoint {
            timestamp: grid.timestamps[i],
            mf_raw: None,
            mf: None,
            model: None,
            sd: None,
            n: grid.n[i],
            is_forecast: false,
        })
        .collect();
    GapFillResult {
        site: site.to_string(),
        strategy,
        outcome: FillOutcome::NoData,
        window: None,
        points,
    }
}

/// Gap-fill one site's series.
pub fn fill(series: &SiteSeries, config: &GapFillConfig) -> GapFillResult {
    let site = series.site();
    let grid = MonthGrid::from_series(series);
    let Some(window) = grid.window() else {
        debug!(site, "no data to fill");
        return no_data(site, &grid, config.strategy);
    };

    let linear_fallback = |reason: FitError| {
        warn!(site, %reason, "seasonal fit failed, using linear interpolation");
        assemble(
            site,
            &grid,
            window,
            linear_channels(&grid),
            &[],
            config.strategy,
            FillOutcome::LinearFallback { reason },
        )
    };

    match config.strategy {
        FillStrategy::Linear => assemble(
            site,
            &grid,
            window,
            linear_channels(&grid),
            &[],
            config.strategy,
            FillOutcome::Linear,
        ),
        FillStrategy::Seasonal => {
            match seasonal_channels(&grid, config, config.forecast_periods) {
                Ok(fit) => {
                    debug!(site, params = ?fit.params, "seasonal fit");
                    assemble(
                        site,
                        &grid,
                        window,
                        fit.channels,
                        &fit.forecast,
                        config.strategy,
                        FillOutcome::Seasonal,
                    )
                }
                Err(reason) => linear_fallback(reason),
            }
        }
        FillStrategy::RobustSeasonal => match robust::robust_channels(&grid, config, site) {
            Ok(fill) => assemble(
                site,
                &grid,
                window,
                fill.channels,
                &fill.forecast,
                config.strategy,
                fill.outcome,
            ),
            Err(reason) => linear_fallback(reason),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::month_timestamp;

    fn series(values: &[Option<f64>]) -> SiteSeries {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let ts = month_timestamp(2000 + (i / 12) as i32, (i % 12) as u32 + 1).unwrap();
                MeasurementPoint::new(ts, *v, v.map(|_| 0.2 + (i % 3) as f64 * 0.1), None)
            })
            .collect();
        SiteSeries::new("mlo", points).unwrap()
    }

    #[test]
    fn strategy_parsing() {
        assert_eq!("robust".parse::<FillStrategy>().unwrap(), FillStrategy::RobustSeasonal);
        assert_eq!("Robust-Seasonal".parse::<FillStrategy>().unwrap(), FillStrategy::RobustSeasonal);
        assert_eq!("LINEAR".parse::<FillStrategy>().unwrap(), FillStrategy::Linear);
        assert!("spline".parse::<FillStrategy>().is_err());
    }

    #[test]
    fn all_null_series_is_no_data() {
        let result = fill(&series(&[None, None, None]), &GapFillConfig::default());
        assert_eq!(result.outcome(), &FillOutcome::NoData);
        assert!(result.window().is_none());
        assert!(result.points().iter().all(|p| p.mf.is_none()));
    }

    #[test]
    fn linear_leaves_edges_and_fills_sd_with_median() {
        let result = fill(
            &series(&[None, Some(1.0), None, None, Some(4.0), None]),
            &GapFillConfig::new(FillStrategy::Linear),
        );
        let mf: Vec<Option<f64>> = result.points().iter().map(|p| p.mf).collect();
        assert_eq!(mf[0], None);
        assert_eq!(mf[5], None);
        assert!(mf[2].unwrap() > 1.0 && mf[3].unwrap() < 4.0);
        assert!((result.points()[2].sd.unwrap() - 0.3).abs() < 1e-12);
        assert_eq!(result.points()[0].sd, None);
        assert!(result.points().iter().all(|p| p.model.is_none()));
    }

    #[test]
    fn sd_median_includes_rows_outside_the_window() {
        let rows = [
            (None, Some(5.0)),
            (Some(1.0), Some(0.2)),
            (None, None),
            (Some(3.0), Some(0.4)),
            (None, Some(9.0)),
            (None, Some(7.0)),
        ];
        let points = rows
            .iter()
            .enumerate()
            .map(|(i, (mf, sd))| {
                MeasurementPoint::new(month_timestamp(2000, i as u32 + 1).unwrap(), *mf, *sd, None)
            })
            .collect();
        let series = SiteSeries::new("mlo", points).unwrap();
        let result = fill(&series, &GapFillConfig::new(FillStrategy::Linear));
        let window = result.window().unwrap();
        assert_eq!(window.first, month_timestamp(2000, 2).unwrap());
        assert_eq!(window.last, month_timestamp(2000, 4).unwrap());
        assert_eq!(result.points()[2].sd, Some(5.0));
        assert_eq!(result.points()[0].sd, None);
        assert_eq!(result.points()[4].sd, None);
    }

    #[test]
    fn short_series_falls_back_with_reason() {
        let values: Vec<Option<f64>> = (0..10).map(|i| (i != 4).then_some(i as f64)).collect();
        let result = fill(&series(&values), &GapFillConfig::new(FillStrategy::Seasonal));
        assert!(result.outcome().is_fallback());
        assert_eq!(result.outcome().label(), "linear_fallback");
        assert!(result.forecast_extension().is_empty());
    }

    #[test]
    fn outcome_serializes_with_state_tag() {
        let outcome = FillOutcome::LinearFallback {
            reason: FitError::InvalidPeriod { period: 1 },
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"state\":\"linear_fallback\""));
    }
}
