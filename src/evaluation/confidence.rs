use crate::core::instances::Scores;
use crate::utils::math::quantile_sorted;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use tracing::debug;

pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInterval {
    pub low: f64,
    pub high: f64,
}

/// Percentile bootstrap.
///
/// Every call to [`interval`](Bootstrap::interval) starts from a generator
/// seeded with `seed`, so identical inputs give identical bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bootstrap {
    n_resamples: usize,
    confidence_level: f64,
    seed: u64,
}

impl Bootstrap {
    pub fn new(n_resamples: usize, confidence_level: f64, seed: u64) -> Self {
        Self {
            n_resamples,
            confidence_level,
            seed,
        }
    }

    pub fn n_resamples(&self) -> usize {
        self.n_resamples
    }

    /// Resamples `units` with replacement `n_resamples` times, evaluates
    /// `statistic` on each resample and returns the two-sided percentile
    /// bounds of the resulting distribution.
    ///
    /// NaN statistics are replaced by draws from the non-NaN ones; if every
    /// resample is NaN both bounds are NaN.
    pub fn interval<T, F>(&self, units: &[T], statistic: F) -> ConfidenceInterval
    where
        F: Fn(&[&T]) -> f64,
    {
        let n = units.len();
        if n == 0 {
            return ConfidenceInterval {
                low: f64::NAN,
                high: f64::NAN,
            };
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        debug!(units = n, resamples = self.n_resamples, "bootstrapping");
        let mut stats: Vec<f64> = (0..self.n_resamples)
            .map(|_| {
                let sample: Vec<&T> = (0..n).map(|_| &units[rng.random_range(0..n)]).collect();
                statistic(&sample)
            })
            .collect();
        resample_from_non_nan(&mut stats, &mut rng);

        stats.sort_by(f64::total_cmp);
        let alpha = 1.0 - self.confidence_level;
        if stats.iter().all(|s| s.is_nan()) {
            return ConfidenceInterval {
                low: f64::NAN,
                high: f64::NAN,
            };
        }
        ConfidenceInterval {
            low: quantile_sorted(&stats, alpha / 2.0),
            high: quantile_sorted(&stats, 1.0 - alpha / 2.0),
        }
    }
}

/// Replaces each NaN in `values` by a value drawn uniformly from the non-NaN
/// entries. Leaves `values` untouched when there is nothing to draw from.
pub fn resample_from_non_nan(values: &mut [f64], rng: &mut StdRng) {
    let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if finite.is_empty() || finite.len() == values.len() {
        return;
    }
    for v in values.iter_mut().filter(|v| v.is_nan()) {
        *v = finite[rng.random_range(0..finite.len())];
    }
}

/// True when every non-NaN value is the same single number, in which case a
/// bootstrap interval carries no information.
fn all_equal(values: impl Iterator<Item = f64>) -> bool {
    let distinct: HashSet<u64> = values.filter(|v| !v.is_nan()).map(f64::to_bits).collect();
    distinct.len() == 1
}

/// Score-based intervals for a list of scored units (instances or groups).
///
/// For each name in `score_names`, `aggregate` is bootstrapped over `units`
/// and reported as `{prefix}{name}_ci_low` / `_ci_high`; the main score is
/// also reported as `score_ci_low` / `score_ci_high`. Names whose unit values
/// are all identical are skipped.
pub fn score_intervals<T, V, A>(
    units: &[T],
    score_names: &[String],
    value_of: V,
    aggregate: A,
    bootstrap: &Bootstrap,
    main_score: &str,
    prefix: &str,
) -> Scores
where
    V: Fn(&T, &str) -> f64,
    A: Fn(&[&T], &str) -> f64,
{
    let mut out = Scores::new();
    for name in score_names {
        if all_equal(units.iter().map(|u| value_of(u, name))) {
            debug!(score = %name, "skipping confidence interval over identical scores");
            continue;
        }
        let ci = bootstrap.interval(units, |sample| aggregate(sample, name));
        out.insert(format!("{prefix}{name}_ci_low"), ci.low);
        out.insert(format!("{prefix}{name}_ci_high"), ci.high);
        if name == main_score {
            out.insert("score_ci_low", ci.low);
            out.insert("score_ci_high", ci.high);
        }
    }
    out
}
