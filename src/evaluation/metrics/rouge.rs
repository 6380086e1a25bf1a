use crate::core::instances::Scores;
use crate::error::Result;
use crate::evaluation::metrics::global_metric::GlobalScorer;
use crate::utils::math::mean;
use crate::utils::text::value_to_text;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

pub const ROUGE_TYPES: [&str; 4] = ["rouge1", "rouge2", "rougeL", "rougeLsum"];

/// Lower-case, replace every run of non-alphanumeric characters by a space
/// and split on whitespace.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn f_measure(hits: usize, predicted: usize, reference: usize) -> f64 {
    if hits == 0 || predicted == 0 || reference == 0 {
        return 0.0;
    }
    let precision = hits as f64 / predicted as f64;
    let recall = hits as f64 / reference as f64;
    2.0 * precision * recall / (precision + recall)
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for gram in tokens.windows(n) {
            *counts.entry(gram).or_default() += 1;
        }
    }
    counts
}

fn rouge_n(prediction: &[String], reference: &[String], n: usize) -> f64 {
    let predicted = ngram_counts(prediction, n);
    let expected = ngram_counts(reference, n);
    let hits: usize = expected
        .iter()
        .map(|(gram, count)| (*count).min(predicted.get(gram).copied().unwrap_or(0)))
        .sum();
    f_measure(
        hits,
        predicted.values().sum(),
        expected.values().sum(),
    )
}

fn lcs_table(a: &[String], b: &[String]) -> Vec<Vec<usize>> {
    let mut table = vec![vec![0; b.len() + 1]; a.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            table[i][j] = if a[i - 1] == b[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i - 1][j].max(table[i][j - 1])
            };
        }
    }
    table
}

/// Indices into `reference` of one longest common subsequence.
fn lcs_indices(reference: &[String], candidate: &[String]) -> Vec<usize> {
    let table = lcs_table(reference, candidate);
    let (mut i, mut j) = (reference.len(), candidate.len());
    let mut out = Vec::new();
    while i > 0 && j > 0 {
        if reference[i - 1] == candidate[j - 1] {
            out.push(i - 1);
            i -= 1;
            j -= 1;
        } else if table[i - 1][j] >= table[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    out.reverse();
    out
}

fn rouge_l(prediction: &[String], reference: &[String]) -> f64 {
    let lcs = lcs_table(reference, prediction)[reference.len()][prediction.len()];
    f_measure(lcs, prediction.len(), reference.len())
}

/// Summary-level LCS over newline-separated sentences.
fn rouge_lsum(prediction: &str, reference: &str) -> f64 {
    let sentences = |text: &str| -> Vec<Vec<String>> {
        text.split('\n')
            .map(tokenize)
            .filter(|s| !s.is_empty())
            .collect()
    };
    let predicted = sentences(prediction);
    let expected = sentences(reference);
    let count = |sents: &[Vec<String>]| -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for token in sents.iter().flatten() {
            *counts.entry(token.clone()).or_default() += 1;
        }
        counts
    };
    let mut predicted_left = count(&predicted);
    let mut expected_left = count(&expected);

    let mut hits = 0;
    for sentence in &expected {
        let union: BTreeSet<usize> = predicted
            .iter()
            .flat_map(|candidate| lcs_indices(sentence, candidate))
            .collect();
        for token in union.into_iter().map(|i| &sentence[i]) {
            match (predicted_left.get_mut(token), expected_left.get_mut(token)) {
                (Some(p), Some(e)) if *p > 0 && *e > 0 => {
                    *p -= 1;
                    *e -= 1;
                    hits += 1;
                }
                _ => {}
            }
        }
    }
    f_measure(
        hits,
        predicted.iter().map(Vec::len).sum(),
        expected.iter().map(Vec::len).sum(),
    )
}

fn rouge_pair(prediction: &str, reference: &str) -> [f64; 4] {
    let p = tokenize(prediction);
    let r = tokenize(reference);
    [
        rouge_n(&p, &r, 1),
        rouge_n(&p, &r, 2),
        rouge_l(&p, &r),
        rouge_lsum(prediction, reference),
    ]
}

/// ROUGE F-measures: each type takes its best value over the references,
/// then is averaged over instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rouge;

impl GlobalScorer for Rouge {
    fn name(&self) -> &str {
        "rouge"
    }

    fn main_score(&self) -> &str {
        "rougeL"
    }

    fn compute(&self, references: &[Vec<Value>], predictions: &[Value], _: &[Map<String, Value>]) -> Result<Scores> {
        let per_instance: Vec<[f64; 4]> = references
            .iter()
            .zip(predictions)
            .map(|(refs, prediction)| {
                let prediction = value_to_text(prediction);
                refs.iter()
                    .map(|r| rouge_pair(&prediction, &value_to_text(r)))
                    .fold([0.0f64; 4], |best, s| {
                        [0, 1, 2, 3].map(|k| best[k].max(s[k]))
                    })
            })
            .collect();
        let mut scores = Scores::new();
        for (k, name) in ROUGE_TYPES.iter().enumerate() {
            let values: Vec<f64> = per_instance.iter().map(|s| s[k]).collect();
            scores.insert(*name, mean(&values));
        }
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

    #[test]
    fn tokenizer_drops_punctuation() {
        assert_eq!(tokenize("General Kenobi!  x-1"), vec!["general", "kenobi", "x", "1"]);
    }

    #[test]
    fn pairwise_scores() {
        let [r1, r2, rl, rlsum] = rouge_pair("hello there", "hello");
        assert!((r1 - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(r2, 0.0);
        assert!((rl - 2.0 / 3.0).abs() < 1e-12);
        assert!((rlsum - 2.0 / 3.0).abs() < 1e-12);

        let [_, _, rl, _] = rouge_pair("a b c d", "a c b d");
        assert!((rl - 0.75).abs() < 1e-12);
    }

    #[test]
    fn summary_level_lcs_spans_sentences() {
        let score = rouge_lsum("the cat sat\non the mat", "the cat\nsat on the mat");
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn best_reference_then_mean() {
        let out = apply_metric(
            Arc::new(GlobalMetric::new(Rouge)),
            json!(["hello there", "general kenobi"]),
            json!([["hello", "there"], ["general kenobi", "general yoda"]]),
            None,
        )
        .unwrap();
        let global = &out[0].score().unwrap().global;
        assert!((global.number("score").unwrap() - 5.0 / 6.0).abs() < 1e-9);
        assert_eq!(global.text("score_name"), Some("rougeL"));
        assert!(ROUGE_TYPES.iter().all(|t| global.contains_key(t)));
    }
}
