//! Property tests for gap-fill invariants.
//!
//! Uses proptest to verify:
//! 1. Observed values pass through: filled equals original wherever observed
//! 2. Linear idempotence: re-filling a linear fill changes nothing
//! 3. Forecast horizon exactness: N forecast periods give exactly N rows

use gaslab_core::domain::{add_months, month_timestamp, MeasurementPoint, SiteSeries};
use gaslab_core::gapfill::{fill, FillStrategy, GapFillConfig};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

/// Monthly values with random gaps; first and last month always observed.
fn arb_values(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<Option<f64>>> {
    prop::collection::vec((200.0..400.0_f64, prop::bool::weighted(0.25)), min_len..max_len)
        .prop_map(|raw| {
            let last = raw.len() - 1;
            raw.into_iter()
                .enumerate()
                .map(|(i, (v, missing))| {
                    let keep = i == 0 || i == last || !missing;
                    keep.then_some((v * 100.0).round() / 100.0)
                })
                .collect()
        })
}

fn arb_strategy() -> impl Strategy<Value = FillStrategy> {
    prop_oneof![
        Just(FillStrategy::Linear),
        Just(FillStrategy::Seasonal),
        Just(FillStrategy::RobustSeasonal),
    ]
}

fn to_series(values: &[Option<f64>]) -> SiteSeries {
    let start = month_timestamp(1995, 1).unwrap();
    let points = values
        .iter()
        .enumerate()
        .map(|(i, v)| MeasurementPoint::new(add_months(start, i as i64).unwrap(), *v, None, None))
        .collect();
    SiteSeries::new("cgo", points).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    // ── 1. Observed values pass through ──────────────────────────────

    #[test]
    fn filled_equals_original_where_observed(
        values in arb_values(3, 60),
        strategy in arb_strategy(),
        forecast in 0usize..6,
    ) {
        let config = GapFillConfig::new(strategy).with_forecast(forecast);
        let result = fill(&to_series(&values), &config);
        for (p, v) in result.points().iter().zip(&values) {
            if let Some(v) = v {
                prop_assert_eq!(p.mf, Some(*v));
                prop_assert_eq!(p.mf_raw, Some(*v));
            }
        }
    }

    #[test]
    fn every_gap_inside_the_window_is_filled(
        values in arb_values(3, 60),
        strategy in arb_strategy(),
    ) {
        let result = fill(&to_series(&values), &GapFillConfig::new(strategy));
        prop_assert!(result.points().iter().all(|p| p.mf.is_some()));
    }

    // ── 2. Linear idempotence ────────────────────────────────────────

    #[test]
    fn linear_fill_is_idempotent(values in arb_values(2, 60)) {
        let config = GapFillConfig::new(FillStrategy::Linear);
        let once = fill(&to_series(&values), &config);
        let twice = fill(&once.to_filled_series(), &config);
        let a: Vec<Option<f64>> = once.points().iter().map(|p| p.mf).collect();
        let b: Vec<Option<f64>> = twice.points().iter().map(|p| p.mf).collect();
        prop_assert_eq!(a, b);
    }

    // ── 3. Forecast horizon exactness ────────────────────────────────

    #[test]
    fn forecast_adds_exactly_n_months(
        values in arb_values(30, 72),
        horizon in 1usize..24,
        robust in any::<bool>(),
    ) {
        let strategy = if robust { FillStrategy::RobustSeasonal } else { FillStrategy::Seasonal };
        let config = GapFillConfig::new(strategy).with_forecast(horizon);
        let result = fill(&to_series(&values), &config);

        prop_assert!(!result.outcome().is_fallback());
        let extension = result.forecast_extension();
        prop_assert_eq!(extension.len(), horizon);
        prop_assert_eq!(result.len(), values.len() + horizon);

        let last_valid = result.window().unwrap().last;
        for (h, p) in extension.iter().enumerate() {
            prop_assert_eq!(p.timestamp, add_months(last_valid, h as i64 + 1).unwrap());
            prop_assert!(p.mf_raw.is_none());
            prop_assert!(p.mf.is_some());
        }
    }
}
