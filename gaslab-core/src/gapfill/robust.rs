//! Seasonal fill with a divergence check and time-reversed refit.
//!
//! Many leading gaps can leave the forward model badly initialized, which
//! shows up as filled values far above anything observed. When the forward
//! fill's maximum exceeds `median + divergence_sigma * std` of the raw
//! series, the model is refitted on the reversed series. The reversed fill
//! is kept only if its maximum does not exceed the forward one. The forecast
//! extension always comes from the forward fit.

use super::grid::MonthGrid;
use super::holt_winters::FitError;
use super::linear::{median, sample_std};
use super::seasonal::{seasonal_channels, Channels, SeasonalFill};
use super::{FillOutcome, GapFillConfig};
use tracing::{debug, warn};

pub(crate) struct RobustFill {
    pub channels: Channels,
    pub forecast: Vec<f64>,
    pub outcome: FillOutcome,
}

fn keep_forward(forward: SeasonalFill) -> RobustFill {
    RobustFill {
        channels: forward.channels,
        forecast: forward.forecast,
        outcome: FillOutcome::DivergenceForwardKept,
    }
}

/// `median + sigma * std` of the observed values, if there are at least two.
pub fn divergence_threshold(observed: &[f64], sigma: f64) -> Option<f64> {
    Some(median(observed)? + sigma * sample_std(observed)?)
}

pub(crate) fn robust_channels(
    grid: &MonthGrid,
    config: &GapFillConfig,
    site: &str,
) -> Result<RobustFill, FitError> {
    let forward = seasonal_channels(grid, config, config.forecast_periods)?;
    let Some((first, last)) = grid.window() else {
        return Err(FitError::NonFinite);
    };

    let observed: Vec<f64> = grid.mf.iter().flatten().copied().collect();
    let forward_max = forward.channels.max_filled(first, last);
    let threshold = divergence_threshold(&observed, config.divergence_sigma);

    let diverged = matches!(threshold, Some(limit) if forward_max > limit);
    if !diverged {
        return Ok(RobustFill {
            channels: forward.channels,
            forecast: forward.forecast,
            outcome: FillOutcome::Seasonal,
        });
    }

    debug!(site, forward_max, ?threshold, "forward fill diverges, refitting reversed");

    match seasonal_channels(&grid.reversed(), config, 0) {
        Ok(reversed) => {
            let channels = reversed.channels.reversed();
            let reversed_max = channels.max_filled(first, last);
            if reversed_max <= forward_max {
                debug!(site, reversed_max, "using reversed fit");
                Ok(RobustFill {
                    channels,
                    forecast: forward.forecast,
                    outcome: FillOutcome::ReversedFit,
                })
            } else {
                warn!(site, forward_max, reversed_max, "reversed fit is no better, keeping forward fill");
                Ok(keep_forward(forward))
            }
        }
        Err(reason) => {
            warn!(site, %reason, "reversed fit failed, keeping forward fill");
            Ok(keep_forward(forward))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_needs_two_observations() {
        assert_eq!(divergence_threshold(&[1.0], 2.0), None);
        let t = divergence_threshold(&[1.0, 2.0, 3.0], 2.0).unwrap();
        assert!((t - 4.0).abs() < 1e-12);
    }
}
