//! End-to-end gap-fill scenarios on a known seasonal signal.

use gaslab_core::domain::{month_timestamp, MeasurementPoint, SiteSeries};
use gaslab_core::gapfill::{fill, FillOutcome, FillStrategy, FitError, GapFillConfig, GapFillResult};
use std::f64::consts::PI;

// ── Helpers ──────────────────────────────────────────────────────────

fn truth(t: usize) -> f64 {
    let t = t as f64;
    300.0 + 0.1 * t + 5.0 * (2.0 * PI * t / 12.0).sin()
}

/// Jan-2000 onwards, `months` long, with the given indices missing.
fn series_with_gaps(months: usize, missing: impl Fn(usize) -> bool) -> SiteSeries {
    let points = (0..months)
        .map(|i| {
            let ts = month_timestamp(2000 + (i / 12) as i32, (i % 12) as u32 + 1).unwrap();
            let mf = (!missing(i)).then(|| truth(i));
            MeasurementPoint::new(ts, mf, mf.map(|_| 0.4), mf.map(|_| 30))
        })
        .collect();
    SiteSeries::new("smo", points).unwrap()
}

/// Mar-2002 through Aug-2002.
const GAP: std::ops::RangeInclusive<usize> = 26..=31;

fn scenario_series() -> SiteSeries {
    series_with_gaps(72, |i| GAP.contains(&i))
}

fn mean_abs_error(result: &GapFillResult) -> f64 {
    GAP.map(|i| (result.points()[i].mf.unwrap() - truth(i)).abs())
        .sum::<f64>()
        / GAP.count() as f64
}

fn assert_observed_unchanged(result: &GapFillResult) {
    for p in result.points() {
        if let Some(raw) = p.mf_raw {
            assert_eq!(p.mf, Some(raw), "filled differs from observed at {}", p.timestamp);
        }
    }
}

// ── Scenario 1: six-month gap ────────────────────────────────────────

#[test]
fn linear_fills_gap_between_neighbours() {
    let result = fill(&scenario_series(), &GapFillConfig::new(FillStrategy::Linear));
    assert_eq!(result.outcome(), &FillOutcome::Linear);
    assert_eq!(result.len(), 72);

    let before = truth(25);
    let after = truth(32);
    let (lo, hi) = (before.min(after), before.max(after));
    for i in GAP {
        let v = result.points()[i].mf.unwrap();
        assert!(v > lo && v < hi, "month {i}: {v} not within ({lo}, {hi})");
        assert_eq!(result.points()[i].model, None);
    }
    assert_observed_unchanged(&result);
}

#[test]
fn seasonal_fills_gap_from_model() {
    let series = scenario_series();
    let linear = fill(&series, &GapFillConfig::new(FillStrategy::Linear));
    let seasonal = fill(&series, &GapFillConfig::new(FillStrategy::Seasonal));

    assert_eq!(seasonal.outcome(), &FillOutcome::Seasonal);
    assert_eq!(seasonal.len(), 72);

    let differs = GAP.any(|i| {
        (seasonal.points()[i].mf.unwrap() - linear.points()[i].mf.unwrap()).abs() > 0.1
    });
    assert!(differs, "seasonal fill should not match linear interpolation");
    assert!(mean_abs_error(&seasonal) < mean_abs_error(&linear));

    for i in GAP {
        assert_eq!(seasonal.points()[i].mf, seasonal.points()[i].model);
    }
    assert_observed_unchanged(&seasonal);
}

#[test]
fn seasonal_model_skips_warmup_months() {
    let result = fill(&scenario_series(), &GapFillConfig::new(FillStrategy::Seasonal));
    assert!(result.points()[..16].iter().all(|p| p.model.is_none()));
    assert!(result.points()[16..].iter().all(|p| p.model.is_some()));

    let shorter = GapFillConfig::new(FillStrategy::Seasonal).with_warmup(4);
    let result = fill(&scenario_series(), &shorter);
    assert!(result.points()[4].model.is_some());
    assert!(result.points()[3].model.is_none());
}

#[test]
fn uncertainty_is_filled_inside_window_only() {
    let series = series_with_gaps(72, |i| i < 3 || GAP.contains(&i));
    let result = fill(&series, &GapFillConfig::new(FillStrategy::Seasonal));
    assert!(result.points()[..3].iter().all(|p| p.sd.is_none()));
    for i in GAP {
        assert_eq!(result.points()[i].sd, Some(0.4));
    }
}

// ── Scenario 2: forecast extension ───────────────────────────────────

#[test]
fn forecast_extends_to_requested_horizon() {
    for strategy in [FillStrategy::Seasonal, FillStrategy::RobustSeasonal] {
        let config = GapFillConfig::new(strategy).with_forecast(12);
        let result = fill(&scenario_series(), &config);

        assert_eq!(result.len(), 84);
        let last = result.points().last().unwrap();
        assert_eq!(last.timestamp, month_timestamp(2006, 12).unwrap());

        let extension = result.forecast_extension();
        assert_eq!(extension.len(), 12);
        assert_eq!(extension[0].timestamp, month_timestamp(2006, 1).unwrap());
        for (h, p) in extension.iter().enumerate() {
            assert!(p.is_forecast);
            assert_eq!(p.mf_raw, None);
            let mf = p.mf.unwrap();
            assert_eq!(p.model, Some(mf));
            assert!((mf - truth(72 + h)).abs() < 1.0, "forecast {h}: {mf}");
        }
    }
}

#[test]
fn forecast_replaces_trailing_missing_months() {
    let series = series_with_gaps(72, |i| i >= 66);
    let config = GapFillConfig::new(FillStrategy::Seasonal).with_forecast(3);
    let result = fill(&series, &config);
    assert_eq!(result.len(), 66 + 3);
    assert_eq!(
        result.window().unwrap().last,
        month_timestamp(2005, 6).unwrap()
    );
    assert_eq!(
        result.forecast_extension()[0].timestamp,
        month_timestamp(2005, 7).unwrap()
    );
}

#[test]
fn without_forecast_trailing_months_stay_unmodeled() {
    let series = series_with_gaps(72, |i| i >= 66);
    let result = fill(&series, &GapFillConfig::new(FillStrategy::Seasonal));
    assert_eq!(result.len(), 72);
    assert!(result.forecast_extension().is_empty());
    for p in &result.points()[66..] {
        assert_eq!(p.mf, None);
        assert_eq!(p.model, None);
    }
}

#[test]
fn linear_strategy_never_forecasts() {
    let config = GapFillConfig::new(FillStrategy::Linear).with_forecast(12);
    let result = fill(&scenario_series(), &config);
    assert_eq!(result.len(), 72);
    assert!(result.forecast_extension().is_empty());
}

// ── Scenario 3: too little history ───────────────────────────────────

#[test]
fn short_series_degrades_to_linear() {
    let series = series_with_gaps(15, |i| i == 5 || i == 6);
    let linear = fill(&series, &GapFillConfig::new(FillStrategy::Linear));

    for strategy in [FillStrategy::Seasonal, FillStrategy::RobustSeasonal] {
        let config = GapFillConfig::new(strategy).with_forecast(6);
        let result = fill(&series, &config);
        assert_eq!(result.points(), linear.points());
        assert_eq!(
            result.outcome(),
            &FillOutcome::LinearFallback {
                reason: FitError::InsufficientHistory {
                    required: 24,
                    available: 15
                }
            }
        );
    }
}

// ── Robust seasonal ──────────────────────────────────────────────────

#[test]
fn robust_keeps_forward_fit_when_plausible() {
    let series = scenario_series();
    let forward = fill(&series, &GapFillConfig::new(FillStrategy::Seasonal));
    let robust = fill(&series, &GapFillConfig::new(FillStrategy::RobustSeasonal));
    assert_eq!(robust.outcome(), &FillOutcome::Seasonal);
    assert_eq!(robust.points(), forward.points());
}

#[test]
fn divergence_never_raises_the_maximum() {
    let series = series_with_gaps(72, |i| (3..10).contains(&i) || GAP.contains(&i));
    let always_diverge = -1000.0;

    let forward = fill(
        &series,
        &GapFillConfig::new(FillStrategy::Seasonal).with_forecast(6),
    );
    let robust = fill(
        &series,
        &GapFillConfig::new(FillStrategy::RobustSeasonal)
            .with_forecast(6)
            .with_divergence_sigma(always_diverge),
    );

    assert_eq!(robust.outcome(), &FillOutcome::ReversedFit);

    let max_in_window = |r: &GapFillResult| {
        r.points()
            .iter()
            .filter(|p| !p.is_forecast)
            .filter_map(|p| p.mf)
            .fold(f64::NEG_INFINITY, f64::max)
    };
    assert!(max_in_window(&robust) <= max_in_window(&forward));

    // The forecast always comes from the forward fit.
    assert_eq!(robust.forecast_extension(), forward.forecast_extension());
    assert_observed_unchanged(&robust);
}

#[test]
fn reversed_fit_models_the_leading_months() {
    let series = series_with_gaps(72, |i| (17..20).contains(&i));
    let config = GapFillConfig::new(FillStrategy::RobustSeasonal).with_divergence_sigma(-1000.0);
    let result = fill(&series, &config);
    assert_eq!(result.outcome(), &FillOutcome::ReversedFit);
    // Warm-up now falls at the end of the record.
    assert!(result.points()[0].model.is_some());
    assert!(result.points()[71].model.is_none());
    assert_observed_unchanged(&result);
}
