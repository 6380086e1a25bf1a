use crate::core::instances::Scores;
use crate::error::{EvalError, Result};
use crate::evaluation::metrics::global_metric::GlobalScorer;
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Numeric reading of a prediction or reference: numbers as-is, strings
/// parsed as floats.
fn numeric(value: &Value, metric: &str) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| EvalError::format(format!("{metric} expects numeric values, got {value}")))
}

/// Predictions and first references as numbers.
fn numeric_pairs(references: &[Vec<Value>], predictions: &[Value], metric: &str) -> Result<Vec<(f64, f64)>> {
    references
        .iter()
        .zip(predictions)
        .map(|(refs, prediction)| {
            let reference = refs.first().ok_or_else(|| {
                EvalError::format(format!("{metric} needs one reference per prediction"))
            })?;
            Ok((numeric(prediction, metric)?, numeric(reference, metric)?))
        })
        .collect()
}

/// Area under the ROC curve of prediction scores against binary references
/// (a reference of 1 is positive). Ties count half. NaN without both
/// classes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RocAuc;

impl GlobalScorer for RocAuc {
    fn name(&self) -> &str {
        "roc_auc"
    }

    fn main_score(&self) -> &str {
        "roc_auc"
    }

    fn compute(&self, references: &[Vec<Value>], predictions: &[Value], _: &[Map<String, Value>]) -> Result<Scores> {
        let pairs = numeric_pairs(references, predictions, "roc_auc")?;
        let (positives, negatives): (Vec<(f64, f64)>, Vec<(f64, f64)>) =
            pairs.into_iter().partition(|(_, label)| *label == 1.0);
        let auc = if positives.is_empty() || negatives.is_empty() {
            f64::NAN
        } else {
            let wins: f64 = positives
                .iter()
                .flat_map(|(p, _)| {
                    negatives.iter().map(move |(n, _)| match p.total_cmp(n) {
                        Ordering::Greater => 1.0,
                        Ordering::Equal => 0.5,
                        Ordering::Less => 0.0,
                    })
                })
                .sum();
            wins / (positives.len() * negatives.len()) as f64
        };
        let mut scores = Scores::new();
        scores.insert("roc_auc", auc);
        Ok(scores)
    }

    fn process_single_instances(&self) -> bool {
        false
    }
}

/// Kendall's tau-b rank correlation between predictions and references.
/// NaN when either side is constant or there are fewer than two instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct KendallTau;

impl KendallTau {
    pub fn tau_b(pairs: &[(f64, f64)]) -> f64 {
        let (mut concordant, mut discordant) = (0i64, 0i64);
        let (mut ties_x, mut ties_y) = (0i64, 0i64);
        for (i, (x1, y1)) in pairs.iter().enumerate() {
            for (x2, y2) in &pairs[i + 1..] {
                match (x1.total_cmp(x2), y1.total_cmp(y2)) {
                    (Ordering::Equal, Ordering::Equal) => {}
                    (Ordering::Equal, _) => ties_x += 1,
                    (_, Ordering::Equal) => ties_y += 1,
                    (dx, dy) if dx == dy => concordant += 1,
                    _ => discordant += 1,
                }
            }
        }
        Self::tau_b_from_counts(concordant, discordant, ties_x, ties_y)
    }

    /// Pair counts to tau-b. Factors are widened to `f64` before the product.
    fn tau_b_from_counts(concordant: i64, discordant: i64, ties_x: i64, ties_y: i64) -> f64 {
        let untied_x = (concordant + discordant + ties_x) as f64;
        let untied_y = (concordant + discordant + ties_y) as f64;
        let denominator = (untied_x * untied_y).sqrt();
        if denominator == 0.0 {
            return f64::NAN;
        }
        (concordant - discordant) as f64 / denominator
    }
}

impl GlobalScorer for KendallTau {
    fn name(&self) -> &str {
        "kendalltau_b"
    }

    fn main_score(&self) -> &str {
        "kendalltau_b"
    }

    fn compute(&self, references: &[Vec<Value>], predictions: &[Value], _: &[Map<String, Value>]) -> Result<Scores> {
        let pairs = numeric_pairs(references, predictions, "kendalltau_b")?;
        let mut scores = Scores::new();
        scores.insert("kendalltau_b", Self::tau_b(&pairs));
        Ok(scores)
    }

    fn process_single_instances(&self) -> bool {
        false
    }
}
