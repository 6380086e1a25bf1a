use crate::core::instances::Scores;
use crate::error::{EvalError, Result};
use crate::evaluation::metrics::global_metric::GlobalScorer;
use crate::utils::text::value_to_text;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Label ignored by multi-label F1.
pub const NONE_LABEL: &str = "none";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum F1Average {
    Macro,
    Micro,
    Weighted,
}

/// One-vs-rest counts of a single label.
#[derive(Debug, Clone, Copy, Default)]
struct Confusion {
    tp: usize,
    fp: usize,
    fn_: usize,
}

impl Confusion {
    fn f1(&self) -> f64 {
        let denominator = 2 * self.tp + self.fp + self.fn_;
        if denominator == 0 {
            0.0
        } else {
            (2 * self.tp) as f64 / denominator as f64
        }
    }

    fn support(&self) -> usize {
        self.tp + self.fn_
    }

    fn add(self, other: Confusion) -> Confusion {
        Confusion {
            tp: self.tp + other.tp,
            fp: self.fp + other.fp,
            fn_: self.fn_ + other.fn_,
        }
    }
}

/// Labels in order of first appearance.
fn ordered_labels<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut out: Vec<&str> = Vec::new();
    for label in labels {
        if !out.contains(&label) {
            out.push(label);
        }
    }
    out
}

/// Per-label F1 (`f1_{label}`) plus the averaged score named `main`.
/// An empty label set gives NaN.
fn f1_scores(main: &str, average: F1Average, per_label: &[(&str, Confusion)]) -> Scores {
    let mut scores = Scores::new();
    if per_label.is_empty() {
        scores.insert(main, f64::NAN);
        return scores;
    }
    let value = match average {
        F1Average::Macro => {
            for (label, counts) in per_label {
                scores.insert(format!("f1_{label}"), counts.f1());
            }
            per_label.iter().map(|(_, c)| c.f1()).sum::<f64>() / per_label.len() as f64
        }
        F1Average::Micro => per_label
            .iter()
            .fold(Confusion::default(), |acc, (_, c)| acc.add(*c))
            .f1(),
        F1Average::Weighted => {
            let total: usize = per_label.iter().map(|(_, c)| c.support()).sum();
            if total == 0 {
                0.0
            } else {
                per_label
                    .iter()
                    .map(|(_, c)| c.f1() * c.support() as f64)
                    .sum::<f64>()
                    / total as f64
            }
        }
    };
    scores.insert(main, value);
    scores
}

/// Single-label F1 over the labels occurring in the references.
/// Predictions outside that set only lower recall.
#[derive(Debug, Clone, Copy)]
pub struct F1 {
    average: F1Average,
    main_score: &'static str,
}

impl F1 {
    pub fn new(average: F1Average) -> Self {
        let main_score = match average {
            F1Average::Macro => "f1_macro",
            F1Average::Micro => "f1_micro",
            F1Average::Weighted => "f1_weighted",
        };
        Self { average, main_score }
    }

    pub fn macro_average() -> Self {
        Self::new(F1Average::Macro)
    }

    pub fn micro_average() -> Self {
        Self::new(F1Average::Micro)
    }

    pub fn weighted() -> Self {
        Self::new(F1Average::Weighted)
    }
}

impl GlobalScorer for F1 {
    fn name(&self) -> &str {
        self.main_score
    }

    fn main_score(&self) -> &str {
        self.main_score
    }

    fn compute(&self, references: &[Vec<Value>], predictions: &[Value], _: &[Map<String, Value>]) -> Result<Scores> {
        let gold = references
            .iter()
            .map(|refs| match refs.as_slice() {
                [single] => Ok(value_to_text(single)),
                _ => Err(EvalError::format(format!(
                    "Only a single reference per prediction is allowed in F1 metric. Received reference: {}",
                    quoted_repr(&Value::Array(refs.clone()))
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        let predicted: Vec<String> = predictions.iter().map(value_to_text).collect();

        let labels = ordered_labels(gold.iter().map(String::as_str));
        let per_label: Vec<(&str, Confusion)> = labels
            .iter()
            .map(|&label| {
                let mut counts = Confusion::default();
                for (g, p) in gold.iter().zip(&predicted) {
                    match (g == label, p == label) {
                        (true, true) => counts.tp += 1,
                        (false, true) => counts.fp += 1,
                        (true, false) => counts.fn_ += 1,
                        (false, false) => {}
                    }
                }
                (label, counts)
            })
            .collect();
        Ok(f1_scores(self.main_score, self.average, &per_label))
    }
}

/// Multi-label F1: every prediction is a list of labels and every instance
/// has exactly one reference, itself a list of labels. The label set is
/// taken from the references, without [`NONE_LABEL`].
#[derive(Debug, Clone, Copy)]
pub struct F1MultiLabel {
    average: F1Average,
    main_score: &'static str,
}

impl F1MultiLabel {
    pub fn macro_average() -> Self {
        Self {
            average: F1Average::Macro,
            main_score: "f1_macro",
        }
    }

    pub fn micro_average() -> Self {
        Self {
            average: F1Average::Micro,
            main_score: "f1_micro",
        }
    }

    pub fn catalog_name(&self) -> &'static str {
        match self.average {
            F1Average::Micro => "f1_micro_multi_label",
            _ => "f1_macro_multi_label",
        }
    }
}

fn label_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

impl GlobalScorer for F1MultiLabel {
    fn name(&self) -> &str {
        self.catalog_name()
    }

    fn main_score(&self) -> &str {
        self.main_score
    }

    fn compute(&self, references: &[Vec<Value>], predictions: &[Value], _: &[Map<String, Value>]) -> Result<Scores> {
        let mut gold = Vec::with_capacity(references.len());
        for refs in references {
            let [reference] = refs.as_slice() else {
                return Err(EvalError::format(format!(
                    "Only a single reference per prediction is allowed in F1 multi label metric. Received reference: {}",
                    quoted_repr(&Value::Array(refs.clone()))
                )));
            };
            let labels = label_list(reference).ok_or_else(|| {
                EvalError::format(format!(
                    "Each reference is expected to be a list of strings in F1 multi label metric. Received reference: {}",
                    quoted_repr(reference)
                ))
            })?;
            gold.push(labels);
        }
        let mut predicted = Vec::with_capacity(predictions.len());
        for prediction in predictions {
            let labels = label_list(prediction).ok_or_else(|| {
                EvalError::format(format!(
                    "Each prediction is expected to be a list of strings in F1 multi label metric. Received prediction: '{}'",
                    quoted_repr(prediction)
                ))
            })?;
            predicted.push(labels);
        }

        let labels = ordered_labels(
            gold.iter()
                .flatten()
                .map(String::as_str)
                .filter(|l| *l != NONE_LABEL),
        );
        let per_label: Vec<(&str, Confusion)> = labels
            .iter()
            .map(|&label| {
                let mut counts = Confusion::default();
                for (g, p) in gold.iter().zip(&predicted) {
                    let in_gold = g.iter().any(|l| l == label);
                    let in_predicted = p.iter().any(|l| l == label);
                    match (in_gold, in_predicted) {
                        (true, true) => counts.tp += 1,
                        (false, true) => counts.fp += 1,
                        (true, false) => counts.fn_ += 1,
                        (false, false) => {}
                    }
                }
                (label, counts)
            })
            .collect();
        Ok(f1_scores(self.main_score, self.average, &per_label))
    }
}

/// Renders a value the way error messages quote user data: strings in
/// single quotes, lists as `[a, b]`.
pub(crate) fn quoted_repr(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{s}'"),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(quoted_repr).collect::<Vec<_>>().join(", ")
        ),
        other => value_to_text(other),
    }
}
