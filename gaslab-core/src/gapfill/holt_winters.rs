//! Additive Holt–Winters (triple exponential smoothing).
//!
//! Level, trend and seasonal components are initialized from the first two
//! seasonal cycles, then the smoothing parameters are chosen by minimizing
//! the in-sample one-step-ahead squared error.

use super::optimize::{minimize, SimplexOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a seasonal model could not be fitted.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum FitError {
    #[error("need at least {required} points for a seasonal fit, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("seasonal period must be at least 2, got {period}")]
    InvalidPeriod { period: usize },

    #[error("model fit produced non-finite values")]
    NonFinite,
}

/// Smoothing parameters, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothingParams {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct InitialState {
    level: f64,
    trend: f64,
    season: Vec<f64>,
}

/// A fitted model.
#[derive(Debug, Clone, PartialEq)]
pub struct HoltWintersFit {
    pub params: SmoothingParams,
    pub period: usize,
    /// One-step-ahead predictions, aligned with the training input.
    pub fitted: Vec<f64>,
    pub sse: f64,
    level: f64,
    trend: f64,
    season: Vec<f64>,
    observations: usize,
}

impl HoltWintersFit {
    /// Predictions for the `horizon` steps after the training data.
    pub fn forecast(&self, horizon: usize) -> Vec<f64> {
        (1..=horizon)
            .map(|h| {
                let s = self.season[(self.observations + h - 1) % self.period];
                self.level + h as f64 * self.trend + s
            })
            .collect()
    }
}

fn initial_state(y: &[f64], period: usize) -> InitialState {
    let m = period as f64;
    let mean1 = y[..period].iter().sum::<f64>() / m;
    let mean2 = y[period..2 * period].iter().sum::<f64>() / m;
    let trend = (mean2 - mean1) / m;
    let center = (m - 1.0) / 2.0;

    let mut season: Vec<f64> = (0..period)
        .map(|j| {
            (0..2)
                .map(|k| {
                    let t = (k * period + j) as f64;
                    y[k * period + j] - (mean1 + (t - center) * trend)
                })
                .sum::<f64>()
                / 2.0
        })
        .collect();
    let offset = season.iter().sum::<f64>() / m;
    season.iter_mut().for_each(|s| *s -= offset);

    InitialState {
        level: mean1 - (center + 1.0) * trend,
        trend,
        season,
    }
}

/// Run the smoothing recursion. Returns (fitted, sse, final state).
fn run(y: &[f64], init: &InitialState, p: SmoothingParams) -> (Vec<f64>, f64, InitialState) {
    let period = init.season.len();
    let mut level = init.level;
    let mut trend = init.trend;
    let mut season = init.season.clone();
    let mut fitted = Vec::with_capacity(y.len());
    let mut sse = 0.0;

    for (t, &obs) in y.iter().enumerate() {
        let j = t % period;
        let prediction = level + trend + season[j];
        fitted.push(prediction);
        sse += (obs - prediction).powi(2);

        let prev_level = level;
        level = p.alpha * (obs - season[j]) + (1.0 - p.alpha) * (level + trend);
        trend = p.beta * (level - prev_level) + (1.0 - p.beta) * trend;
        season[j] = p.gamma * (obs - level) + (1.0 - p.gamma) * season[j];
    }

    (
        fitted,
        sse,
        InitialState {
            level,
            trend,
            season,
        },
    )
}

fn squash(u: f64) -> f64 {
    1.0 / (1.0 + (-u).exp())
}

fn unsquash(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

/// Fit an additive Holt–Winters model to a gap-free series.
///
/// Requires at least two full seasonal cycles.
pub fn fit(y: &[f64], period: usize, max_iterations: usize) -> Result<HoltWintersFit, FitError> {
    if period < 2 {
        return Err(FitError::InvalidPeriod { period });
    }
    if y.len() < 2 * period {
        return Err(FitError::InsufficientHistory {
            required: 2 * period,
            available: y.len(),
        });
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite);
    }

    let init = initial_state(y, period);
    let to_params = |u: &[f64]| SmoothingParams {
        alpha: squash(u[0]),
        beta: squash(u[1]),
        gamma: squash(u[2]),
    };

    let start = [unsquash(0.3), unsquash(0.05), unsquash(0.1)];
    let options = SimplexOptions {
        max_iterations,
        ..SimplexOptions::default()
    };
    let best = minimize(|u| run(y, &init, to_params(u)).1, &start, options);

    let params = to_params(&best.x);
    let (fitted, sse, state) = run(y, &init, params);
    if !sse.is_finite() || fitted.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite);
    }

    Ok(HoltWintersFit {
        params,
        period,
        fitted,
        sse,
        level: state.level,
        trend: state.trend,
        season: state.season,
        observations: y.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn seasonal_series(n: usize) -> Vec<f64> {
        (0..n)
            .map(|t| {
                let t = t as f64;
                300.0 + 0.1 * t + 5.0 * (2.0 * PI * t / 12.0).sin()
            })
            .collect()
    }

    #[test]
    fn initial_state_recovers_exact_components() {
        let y = seasonal_series(24);
        let init = initial_state(&y, 12);
        assert!((init.trend - 0.1).abs() < 1e-9);
        assert!((init.level + init.trend - 300.0).abs() < 1e-9);
        assert!((init.season[3] - 5.0).abs() < 1e-9);
        assert!(init.season.iter().sum::<f64>().abs() < 1e-9);
    }

    #[test]
    fn noiseless_series_is_fitted_closely() {
        let y = seasonal_series(60);
        let fit = fit(&y, 12, 500).unwrap();
        assert_eq!(fit.fitted.len(), 60);
        for (f, o) in fit.fitted.iter().zip(&y) {
            assert!((f - o).abs() < 1e-3, "fitted {f} vs {o}");
        }
    }

    #[test]
    fn forecast_continues_trend_and_season() {
        let y = seasonal_series(72);
        let fit = fit(&y, 12, 500).unwrap();
        let truth = seasonal_series(84);
        let forecast = fit.forecast(12);
        assert_eq!(forecast.len(), 12);
        for (f, t) in forecast.iter().zip(&truth[72..]) {
            assert!((f - t).abs() < 1e-2, "forecast {f} vs {t}");
        }
    }

    #[test]
    fn short_series_is_insufficient_history() {
        let y = seasonal_series(15);
        assert_eq!(
            fit(&y, 12, 100).unwrap_err(),
            FitError::InsufficientHistory {
                required: 24,
                available: 15
            }
        );
    }

    #[test]
    fn degenerate_period_is_rejected() {
        assert_eq!(
            fit(&[1.0, 2.0, 3.0], 1, 100).unwrap_err(),
            FitError::InvalidPeriod { period: 1 }
        );
    }

    #[test]
    fn params_stay_in_unit_interval() {
        let y: Vec<f64> = seasonal_series(48)
            .iter()
            .enumerate()
            .map(|(i, v)| v + if i % 7 == 0 { 2.0 } else { -0.5 })
            .collect();
        let fit = fit(&y, 12, 300).unwrap();
        for p in [fit.params.alpha, fit.params.beta, fit.params.gamma] {
            assert!((0.0..=1.0).contains(&p));
        }
    }
}
