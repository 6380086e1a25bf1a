use crate::core::instances::Scores;
use crate::error::Result;
use crate::evaluation::metrics::global_metric::GlobalScorer;
use crate::evaluation::metrics::instance_metric::InstanceScorer;
use crate::utils::math::mean;
use crate::utils::text::{normalize_answer, normalized_tokens, value_to_text};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// 1.0 when the prediction equals one of the references.
#[derive(Debug, Clone, Copy, Default)]
pub struct Accuracy;

impl InstanceScorer for Accuracy {
    fn name(&self) -> &str {
        "accuracy"
    }

    fn main_score(&self) -> &str {
        "accuracy"
    }

    fn compute(&self, references: &[Value], prediction: &Value, _: &Map<String, Value>) -> Result<Scores> {
        let prediction = value_to_text(prediction);
        let hit = references.iter().any(|r| value_to_text(r) == prediction);
        let mut scores = Scores::new();
        scores.insert("accuracy", if hit { 1.0 } else { 0.0 });
        Ok(scores)
    }
}

/// 1.0 when some reference occurs inside the prediction.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringContainment;

impl InstanceScorer for StringContainment {
    fn name(&self) -> &str {
        "string_containment"
    }

    fn main_score(&self) -> &str {
        "string_containment"
    }

    fn compute(&self, references: &[Value], prediction: &Value, _: &Map<String, Value>) -> Result<Scores> {
        let prediction = value_to_text(prediction);
        let hit = references
            .iter()
            .any(|r| prediction.contains(value_to_text(r).as_str()));
        let mut scores = Scores::new();
        scores.insert("string_containment", if hit { 1.0 } else { 0.0 });
        Ok(scores)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Overlap {
    precision: f64,
    recall: f64,
    f1: f64,
}

fn common_tokens(prediction: &[String], reference: &[String]) -> usize {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in reference {
        *counts.entry(token.as_str()).or_default() += 1;
    }
    prediction
        .iter()
        .filter(|token| match counts.get_mut(token.as_str()) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        })
        .count()
}

fn overlap(prediction: &[String], reference: &[String]) -> Overlap {
    let common = common_tokens(prediction, reference);
    if common == 0 {
        return Overlap {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
        };
    }
    let precision = common as f64 / prediction.len() as f64;
    let recall = common as f64 / reference.len() as f64;
    Overlap {
        precision,
        recall,
        f1: 2.0 * precision * recall / (precision + recall),
    }
}

/// Multiset token overlap after answer normalization; each of precision,
/// recall and f1 is maximized over the references on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenOverlap;

impl InstanceScorer for TokenOverlap {
    fn name(&self) -> &str {
        "token_overlap"
    }

    fn main_score(&self) -> &str {
        "f1"
    }

    fn ci_scores(&self) -> Vec<String> {
        vec!["f1".into(), "precision".into(), "recall".into()]
    }

    fn compute(&self, references: &[Value], prediction: &Value, _: &Map<String, Value>) -> Result<Scores> {
        let prediction = normalized_tokens(&value_to_text(prediction));
        let best = references
            .iter()
            .map(|r| overlap(&prediction, &normalized_tokens(&value_to_text(r))))
            .fold(
                Overlap {
                    precision: 0.0,
                    recall: 0.0,
                    f1: 0.0,
                },
                |acc, o| Overlap {
                    precision: acc.precision.max(o.precision),
                    recall: acc.recall.max(o.recall),
                    f1: acc.f1.max(o.f1),
                },
            );
        let mut scores = Scores::new();
        scores.insert("f1", best.f1);
        scores.insert("precision", best.precision);
        scores.insert("recall", best.recall);
        Ok(scores)
    }
}

/// SQuAD exact match and token F1, in percent.
#[derive(Debug, Clone, Copy, Default)]
pub struct Squad;

impl Squad {
    fn f1(prediction: &[String], reference: &[String]) -> f64 {
        if prediction.is_empty() || reference.is_empty() {
            return if prediction == reference { 1.0 } else { 0.0 };
        }
        overlap(prediction, reference).f1
    }

    fn score_one(references: &[Value], prediction: &Value) -> (f64, f64) {
        let prediction = value_to_text(prediction);
        let normalized = normalize_answer(&prediction);
        let tokens = normalized_tokens(&prediction);
        references.iter().fold((0.0f64, 0.0f64), |(em, f1), r| {
            let reference = value_to_text(r);
            let exact = if normalize_answer(&reference) == normalized { 1.0 } else { 0.0 };
            (em.max(exact), f1.max(Self::f1(&tokens, &normalized_tokens(&reference))))
        })
    }
}

impl GlobalScorer for Squad {
    fn name(&self) -> &str {
        "squad"
    }

    fn main_score(&self) -> &str {
        "f1"
    }

    fn compute(&self, references: &[Vec<Value>], predictions: &[Value], _: &[Map<String, Value>]) -> Result<Scores> {
        let (exact, f1): (Vec<f64>, Vec<f64>) = references
            .iter()
            .zip(predictions)
            .map(|(refs, p)| Self::score_one(refs, p))
            .unzip();
        let mut scores = Scores::new();
        scores.insert("exact_match", 100.0 * mean(&exact));
        scores.insert("f1", 100.0 * mean(&f1));
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::metrics::GlobalMetric;
    use crate::testing::apply_metric;
    use serde_json::json;
    use std::sync::Arc;

    fn instance_score(scorer: &dyn InstanceScorer, prediction: Value, references: Value) -> Scores {
        let references = references.as_array().cloned().unwrap();
        scorer.compute(&references, &prediction, &Map::new()).unwrap()
    }

    #[test]
    fn accuracy_and_containment() {
        let s = instance_score(&Accuracy, json!("10"), json!(["1", "10", "100"]));
        assert_eq!(s.number("accuracy"), Some(1.0));
        let s = instance_score(&Accuracy, json!("C"), json!(["c", " C"]));
        assert_eq!(s.number("accuracy"), Some(0.0));

        let s = instance_score(&StringContainment, json!("123"), json!(["13", "23"]));
        assert_eq!(s.number("string_containment"), Some(1.0));
        let s = instance_score(&StringContainment, json!("BCD"), json!(["  ", " BD"]));
        assert_eq!(s.number("string_containment"), Some(0.0));
    }

    #[test]
    fn token_overlap_maximizes_each_measure() {
        let s = instance_score(
            &TokenOverlap,
            json!("hello there general dude"),
            json!(["hello there general kenobi", "hello there!"]),
        );
        assert_eq!(s.number("f1"), Some(0.75));
        assert_eq!(s.number("precision"), Some(0.75));
        assert_eq!(s.number("recall"), Some(1.0));
    }

    #[test]
    fn repeated_tokens_count_once_per_match() {
        let tokens = |s: &str| normalized_tokens(s);
        assert_eq!(common_tokens(&tokens("a b b b"), &tokens("b b c")), 2);
    }

    #[test]
    fn squad_scores() {
        let out = apply_metric(
            Arc::new(GlobalMetric::new(Squad)),
            json!(["1976", "Beyonce", "climate change"]),
            json!([["1976"], ["Beyoncé and Bruno Mars"], ["climate change"]]),
            None,
        )
        .unwrap();
        let global = &out[0].score().unwrap().global;
        assert!((global.number("score").unwrap() - 200.0 / 3.0).abs() < 1e-9);

        let first = &out[0].score().unwrap().instance;
        assert_eq!(first.number("exact_match"), Some(100.0));
        assert_eq!(first.number("f1"), Some(100.0));
        assert_eq!(first.text("score_name"), Some("f1"));
        assert_eq!(out[1].score().unwrap().instance.number("score"), Some(0.0));
    }
}
