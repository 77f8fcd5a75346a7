//! Linear and seasonal fills on a month grid.

use super::grid::MonthGrid;
use super::holt_winters::{self, FitError, SmoothingParams};
use super::linear::interpolate;
use super::GapFillConfig;

/// Filled and modeled values aligned with a grid.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Channels {
    pub filled: Vec<Option<f64>>,
    pub model: Vec<Option<f64>>,
}

impl Channels {
    pub fn reversed(self) -> Self {
        Self {
            filled: self.filled.into_iter().rev().collect(),
            model: self.model.into_iter().rev().collect(),
        }
    }

    /// Largest filled value in `[first, last]`.
    pub fn max_filled(&self, first: usize, last: usize) -> f64 {
        self.filled[first..=last]
            .iter()
            .flatten()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SeasonalFill {
    pub channels: Channels,
    pub forecast: Vec<f64>,
    pub params: SmoothingParams,
}

pub(crate) fn linear_channels(grid: &MonthGrid) -> Channels {
    Channels {
        filled: interpolate(&grid.times, &grid.mf),
        model: vec![None; grid.len()],
    }
}

/// Fit a Holt–Winters model to the linearly pre-filled validity window.
///
/// Model output covers the window only, minus the first `warmup_periods`
/// points. Gaps take the model value where there is one and the linear
/// value otherwise. `horizon` forecast values follow the window.
pub(crate) fn seasonal_channels(
    grid: &MonthGrid,
    config: &GapFillConfig,
    horizon: usize,
) -> Result<SeasonalFill, FitError> {
    let linear = interpolate(&grid.times, &grid.mf);
    let Some((first, last)) = grid.window() else {
        return Err(FitError::InsufficientHistory {
            required: 2 * config.seasonal_periods,
            available: 0,
        });
    };

    let training = linear[first..=last]
        .iter()
        .map(|v| v.ok_or(FitError::NonFinite))
        .collect::<Result<Vec<f64>, _>>()?;
    let fit = holt_winters::fit(&training, config.seasonal_periods, config.max_iterations)?;

    let mut model = vec![None; grid.len()];
    for (k, value) in fit.fitted.iter().enumerate().skip(config.warmup_periods) {
        model[first + k] = Some(*value);
    }

    let filled = (0..grid.len())
        .map(|i| grid.mf[i].or(model[i]).or(linear[i]))
        .collect();

    Ok(SeasonalFill {
        channels: Channels { filled, model },
        forecast: fit.forecast(horizon),
        params: fit.params,
    })
}
