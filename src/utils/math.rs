use crate::evaluation::estimators::{Estimator, SkipNanMean, StrictMean};

/// Arithmetic mean; NaN if empty or if any value is NaN.
pub fn mean(values: &[f64]) -> f64 {
    let mut e = StrictMean::default();
    e.add_all(values.iter().copied());
    e.estimation()
}

/// Mean of the non-NaN values; NaN if there are none.
pub fn nan_mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let mut e = SkipNanMean::default();
    e.add_all(values);
    e.estimation()
}

/// Unbiased (n - 1) variance; NaN with fewer than two values.
pub fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (n as f64 - 1.0)
}

/// Quantile `q` in `[0, 1]` of already sorted values, interpolating linearly
/// between the two closest ranks.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}
