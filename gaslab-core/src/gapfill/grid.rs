//! Regular month-start grid that the fill strategies operate on.

use crate::domain::{add_months, months_between, SiteSeries};
use chrono::NaiveDateTime;

/// One site's series laid onto consecutive months, with missing months
/// present as nulls.
///
/// `times` are days since the Unix epoch and drive time-weighted
/// interpolation. A reversed grid negates them so they stay increasing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MonthGrid {
    pub timestamps: Vec<NaiveDateTime>,
    pub times: Vec<f64>,
    pub mf: Vec<Option<f64>>,
    pub sd: Vec<Option<f64>>,
    pub n: Vec<Option<u32>>,
}

fn days(ts: NaiveDateTime) -> f64 {
    ts.and_utc().timestamp() as f64 / 86_400.0
}

impl MonthGrid {
    pub fn from_series(series: &SiteSeries) -> Self {
        let monthly;
        let series = if series.is_month_aligned() {
            series
        } else {
            monthly = series.resample_monthly();
            &monthly
        };

        let points = series.points();
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return Self {
                timestamps: Vec::new(),
                times: Vec::new(),
                mf: Vec::new(),
                sd: Vec::new(),
                n: Vec::new(),
            };
        };

        let len = months_between(first.timestamp, last.timestamp).max(0) as usize + 1;
        let timestamps: Vec<NaiveDateTime> = (0..len)
            .map_while(|i| add_months(first.timestamp, i as i64))
            .collect();
        let len = timestamps.len();

        let mut grid = Self {
            times: timestamps.iter().map(|ts| days(*ts)).collect(),
            timestamps,
            mf: vec![None; len],
            sd: vec![None; len],
            n: vec![None; len],
        };
        for p in points {
            let i = months_between(first.timestamp, p.timestamp) as usize;
            if i < len {
                grid.mf[i] = p.mf;
                grid.sd[i] = p.sd;
                grid.n[i] = p.n;
            }
        }
        grid
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Indices of the first and last non-null mole fraction.
    pub fn window(&self) -> Option<(usize, usize)> {
        let first = self.mf.iter().position(Option::is_some)?;
        let last = self.mf.iter().rposition(Option::is_some)?;
        Some((first, last))
    }

    /// The same grid in reverse time order.
    pub fn reversed(&self) -> Self {
        fn rev<T: Clone>(v: &[T]) -> Vec<T> {
            v.iter().rev().cloned().collect()
        }
        Self {
            timestamps: rev(&self.timestamps),
            times: self.times.iter().rev().map(|t| -t).collect(),
            mf: rev(&self.mf),
            sd: rev(&self.sd),
            n: rev(&self.n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{month_timestamp, MeasurementPoint};

    #[test]
    fn missing_months_become_nulls() {
        let series = SiteSeries::new(
            "brw",
            vec![
                MeasurementPoint::new(month_timestamp(2001, 11).unwrap(), Some(1.0), None, None),
                MeasurementPoint::new(month_timestamp(2002, 2).unwrap(), Some(4.0), None, None),
            ],
        )
        .unwrap();
        let grid = MonthGrid::from_series(&series);
        assert_eq!(grid.len(), 4);
        assert_eq!(grid.mf, vec![Some(1.0), None, None, Some(4.0)]);
        assert_eq!(grid.timestamps[2], month_timestamp(2002, 1).unwrap());
        assert_eq!(grid.window(), Some((0, 3)));
    }

    #[test]
    fn reversal_keeps_times_increasing() {
        let series = SiteSeries::new(
            "brw",
            (1..=3)
                .map(|m| {
                    MeasurementPoint::new(month_timestamp(2001, m).unwrap(), Some(m as f64), None, None)
                })
                .collect(),
        )
        .unwrap();
        let grid = MonthGrid::from_series(&series).reversed();
        assert!(grid.times.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(grid.mf, vec![Some(3.0), Some(2.0), Some(1.0)]);
        assert_eq!(grid.reversed().reversed(), grid);
    }

    #[test]
    fn empty_series_gives_empty_grid() {
        let grid = MonthGrid::from_series(&SiteSeries::empty("x"));
        assert_eq!(grid.len(), 0);
        assert_eq!(grid.window(), None);
    }
}
