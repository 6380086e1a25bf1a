//! Paired statistics contrasting a control subgroup against a comparison
//! subgroup of one group. All of them return NaN when a subgroup they need
//! is empty.

use crate::error::{EvalError, Result};
use crate::utils::math::{mean, sample_variance};
use std::f64::consts::PI;

/// Hedges' g values are clipped to this magnitude before normalizing.
const HEDGES_G_CAP: f64 = 5.0;

/// `1 - mean(comparison) / mean(control)`: the share of the control
/// performance lost in the comparison subgroup.
///
/// A zero control mean gives 0 if the comparison mean is also 0 and NaN
/// otherwise.
pub fn performance_drop_rate(control: &[f64], comparison: &[f64]) -> f64 {
    if control.is_empty() || comparison.is_empty() {
        return f64::NAN;
    }
    let control_mean = mean(control);
    let comparison_mean = mean(comparison);
    if control_mean == 0.0 {
        return if comparison_mean == 0.0 { 0.0 } else { f64::NAN };
    }
    1.0 - comparison_mean / control_mean
}

/// Cohen's h between two proportions, divided by its maximum magnitude
/// `pi` so the result lies in `[-1, 1]`. Positive when the comparison mean
/// is higher.
///
/// Both means must be proportions; anything outside `[0, 1]` is a format
/// error.
pub fn normalized_cohens_h(control: &[f64], comparison: &[f64]) -> Result<f64> {
    if control.is_empty() || comparison.is_empty() {
        return Ok(f64::NAN);
    }
    let p1 = mean(control);
    let p2 = mean(comparison);
    for p in [p1, p2] {
        if !p.is_nan() && !(0.0..=1.0).contains(&p) {
            return Err(EvalError::format(format!(
                "Cohen's h needs mean scores in [0, 1], got {p}"
            )));
        }
    }
    let h = 2.0 * (p2.sqrt().asin() - p1.sqrt().asin());
    Ok((h / PI).clamp(-1.0, 1.0))
}

/// Hedges' g (standardized mean difference with small-sample correction),
/// clipped to `[-5, 5]` and divided by 5.
///
/// When the pooled standard deviation is 0 any nonzero difference is
/// reported at the cap.
pub fn normalized_hedges_g(control: &[f64], comparison: &[f64]) -> f64 {
    let (n1, n2) = (control.len(), comparison.len());
    if n1 == 0 || n2 == 0 || (n1 <= 1 && n2 <= 1) {
        return f64::NAN;
    }
    let difference = mean(comparison) - mean(control);
    if difference == 0.0 {
        return 0.0;
    }
    if difference.is_nan() {
        return f64::NAN;
    }
    let variance = |values: &[f64]| {
        if values.len() > 1 {
            sample_variance(values)
        } else {
            0.0
        }
    };
    let pooled_sd = (((n1 - 1) as f64 * variance(control) + (n2 - 1) as f64 * variance(comparison))
        / (n1 + n2 - 2) as f64)
        .sqrt();
    if pooled_sd == 0.0 {
        return difference.signum();
    }

    let mut g = difference / pooled_sd;
    let n = (n1 + n2) as f64;
    if 3.0 < n && n < 50.0 {
        g *= ((n - 3.0) / (n - 2.25)) * ((n - 2.0) / n).sqrt();
    }
    g.clamp(-HEDGES_G_CAP, HEDGES_G_CAP) / HEDGES_G_CAP
}
