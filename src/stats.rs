//! Small numeric kernels shared by the aggregation stages.

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (ddof = 1). None below 2 observations.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mu = values.iter().sum::<f64>() / values.len() as f64;
    let var = values
        .iter()
        .map(|v| {
            let d = v - mu;
            d * d
        })
        .sum::<f64>()
        / (values.len() as f64 - 1.0);
    Some(var.sqrt())
}

/// Linear-interpolation quantile over a pre-sorted ascending slice.
/// q in [0,1]. Monotone in q by construction.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    if sorted.len() == 1 {
        return Some(sorted[0]);
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let frac = pos - lo as f64;
    Some(sorted[lo] * (1.0 - frac) + sorted[hi] * frac)
}

/// Empirical-CDF percentile: fraction of the group strictly below `value`,
/// expressed 0-100. Ties share the lower percentile.
pub fn percentile_strictly_below(group: &[f64], value: f64) -> f64 {
    if group.is_empty() {
        return 0.0;
    }
    let below = group.iter().filter(|v| **v < value).count();
    100.0 * below as f64 / group.len() as f64
}

/// Per-90 normalization: (total / minutes) * 90, defined only from the first
/// played minute. None — not zero — below that, so a missing measurement never
/// reads as a measured zero.
pub fn per90(total: f64, minutes: f64) -> Option<f64> {
    if minutes >= 1.0 {
        Some(total / minutes * 90.0)
    } else {
        None
    }
}

/// sum(num)/sum(den) when the denominator is positive.
pub fn ratio(num: f64, den: f64) -> Option<f64> {
    if den > 0.0 { Some(num / den) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantiles_are_monotone() {
        let mut v = vec![4.0, 1.0, 3.0, 2.0, 10.0, 7.0];
        v.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let p25 = quantile_sorted(&v, 0.25).unwrap();
        let p50 = quantile_sorted(&v, 0.50).unwrap();
        let p75 = quantile_sorted(&v, 0.75).unwrap();
        let p90 = quantile_sorted(&v, 0.90).unwrap();
        assert!(p25 <= p50 && p50 <= p75 && p75 <= p90);
    }

    #[test]
    fn quantile_interpolates() {
        let v = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&v, 0.5).unwrap(), 2.5);
        assert_eq!(quantile_sorted(&v, 0.0).unwrap(), 1.0);
        assert_eq!(quantile_sorted(&v, 1.0).unwrap(), 4.0);
    }

    #[test]
    fn percentile_is_strictly_below() {
        let g = vec![1.0, 2.0, 2.0, 3.0];
        assert_eq!(percentile_strictly_below(&g, 2.0), 25.0);
        assert_eq!(percentile_strictly_below(&g, 3.0), 75.0);
        assert_eq!(percentile_strictly_below(&g, 0.5), 0.0);
    }

    #[test]
    fn per90_null_below_one_minute() {
        assert_eq!(per90(3.0, 0.0), None);
        assert_eq!(per90(3.0, 0.9), None);
        assert_eq!(per90(2.0, 90.0), Some(2.0));
        assert_eq!(per90(1.0, 45.0), Some(2.0));
    }

    #[test]
    fn sample_std_needs_two() {
        assert_eq!(sample_std(&[5.0]), None);
        let s = sample_std(&[2.0, 4.0]).unwrap();
        assert!((s - std::f64::consts::SQRT_2).abs() < 1e-12);
    }
}
