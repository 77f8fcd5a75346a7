//! Time-weighted linear interpolation and the summary statistics the
//! strategies share.

/// Fill nulls strictly between the first and last non-null value by linear
/// interpolation in `times`. Values outside that span stay null; non-null
/// values are returned unchanged.
pub fn interpolate(times: &[f64], values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = values.to_vec();
    let mut prev: Option<usize> = None;

    for i in 0..values.len() {
        if values[i].is_none() {
            continue;
        }
        if let Some(p) = prev {
            if i > p + 1 {
                if let (Some(y0), Some(y1)) = (values[p], values[i]) {
                    let (t0, t1) = (times[p], times[i]);
                    for k in p + 1..i {
                        let w = (times[k] - t0) / (t1 - t0);
                        out[k] = Some(y0 + w * (y1 - y0));
                    }
                }
            }
        }
        prev = Some(i);
    }
    out
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_gaps_are_time_weighted() {
        let times = [0.0, 31.0, 59.0, 90.0];
        let values = [Some(0.0), None, None, Some(90.0)];
        let out = interpolate(&times, &values);
        assert_eq!(out[0], Some(0.0));
        assert!((out[1].unwrap() - 31.0).abs() < 1e-12);
        assert!((out[2].unwrap() - 59.0).abs() < 1e-12);
        assert_eq!(out[3], Some(90.0));
    }

    #[test]
    fn edges_are_not_extrapolated() {
        let times = [0.0, 1.0, 2.0, 3.0, 4.0];
        let values = [None, Some(1.0), None, Some(3.0), None];
        let out = interpolate(&times, &values);
        assert_eq!(out, vec![None, Some(1.0), Some(2.0), Some(3.0), None]);
    }

    #[test]
    fn stats() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
        let sd = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.138089935299395).abs() < 1e-12);
        assert_eq!(sample_std(&[1.0]), None);
    }
}
