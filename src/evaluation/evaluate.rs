use crate::catalog::Catalog;
use crate::core::instances::{Instance, Scores};
use crate::error::{EvalError, Result};
use crate::evaluation::metrics::{MetricOperator, Resampling};
use crate::operators::StreamOperator;
use crate::streams::MultiStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::info;

const EVALUATION_SPLIT: &str = "test";

/// Column-oriented table: every column holds one value per row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnarTable {
    pub columns: BTreeMap<String, Vec<Value>>,
}

impl ColumnarTable {
    pub fn num_rows(&self) -> Result<usize> {
        let mut lengths = self.columns.iter().map(|(name, values)| (name, values.len()));
        let Some((_, rows)) = lengths.next() else {
            return Ok(0);
        };
        match lengths.find(|(_, len)| *len != rows) {
            Some((name, len)) => Err(EvalError::format(format!(
                "column '{name}' has {len} values, expected {rows}"
            ))),
            None => Ok(rows),
        }
    }

    fn to_records(&self) -> Result<Vec<Instance>> {
        let rows = self.num_rows()?;
        Ok((0..rows)
            .map(|row| {
                self.columns
                    .iter()
                    .map(|(name, values)| (name.clone(), values[row].clone()))
                    .collect::<Map<String, Value>>()
                    .into()
            })
            .collect())
    }

    fn from_records(records: &[Instance]) -> Self {
        let mut columns: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for record in records {
            for (name, value) in record.fields() {
                columns.entry(name.clone()).or_default().push(value.clone());
            }
        }
        Self { columns }
    }
}

/// Input (and output) of [`evaluate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    Records(Vec<Instance>),
    Columns(ColumnarTable),
}

impl Dataset {
    fn to_records(&self) -> Result<Vec<Instance>> {
        match self {
            Dataset::Records(records) => Ok(records.clone()),
            Dataset::Columns(table) => table.to_records(),
        }
    }

    pub fn len(&self) -> Result<usize> {
        match self {
            Dataset::Records(records) => Ok(records.len()),
            Dataset::Columns(table) => table.num_rows(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    /// The input with one extra column per metric holding instance scores.
    pub dataset: Dataset,
    /// Global score mapping, keyed by metric name.
    pub global_scores: BTreeMap<String, Scores>,
}

/// Scores `dataset` with every named catalog metric.
///
/// Each metric sees the dataset as a fresh `"test"` partition. Confidence
/// intervals are only computed when `compute_conf_intervals` is set.
pub fn evaluate(
    dataset: &Dataset,
    metric_names: &[&str],
    catalog: &Catalog,
    compute_conf_intervals: bool,
) -> Result<Evaluation> {
    let inputs = dataset.to_records()?;
    let mut outputs = inputs.clone();
    let mut global_scores = BTreeMap::new();
    let resampling = if compute_conf_intervals {
        Resampling::Configured
    } else {
        Resampling::Disabled
    };

    for &name in metric_names {
        let metric = catalog.metric(name)?;
        let operator = MetricOperator::new(metric).with_resampling(resampling);
        let multi_stream = MultiStream::from_iterables([(EVALUATION_SPLIT, inputs.clone())], true);
        let mut scored = operator.apply(multi_stream)?.stream(EVALUATION_SPLIT)?.collect_instances()?;

        let global = scored
            .first()
            .and_then(Instance::score)
            .map(|record| record.global.clone())
            .unwrap_or_default();
        info!(metric = name, instances = scored.len(), score = ?global.number("score"), "evaluated metric");

        for (output, instance) in outputs.iter_mut().zip(scored.iter_mut()) {
            let scores = instance.take_score().unwrap_or_default().instance;
            output.insert(name, serde_json::to_value(&scores)?);
        }
        global_scores.insert(name.to_string(), global);
    }

    let dataset = match dataset {
        Dataset::Records(_) => Dataset::Records(outputs),
        Dataset::Columns(_) => Dataset::Columns(ColumnarTable::from_records(&outputs)),
    };
    Ok(Evaluation {
        dataset,
        global_scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<Instance> {
        [("a", "a"), ("b", "c"), ("d", "d"), ("e", "e")]
            .into_iter()
            .map(|(p, r)| Instance::new().with("prediction", p).with("references", json!([r])))
            .collect()
    }

    #[test]
    fn records_gain_a_score_column_per_metric() {
        let catalog = Catalog::with_defaults();
        let out = evaluate(
            &Dataset::Records(records()),
            &["metrics.accuracy", "metrics.string_containment"],
            &catalog,
            false,
        )
        .unwrap();

        let Dataset::Records(rows) = &out.dataset else {
            panic!("expected records");
        };
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].get("metrics.accuracy").unwrap()["score"], json!(0.0));
        assert_eq!(rows[0].get("metrics.string_containment").unwrap()["score"], json!(1.0));
        assert!(rows[0].score().is_none());

        let accuracy = &out.global_scores["metrics.accuracy"];
        assert_eq!(accuracy.number("score"), Some(0.75));
        assert!(!accuracy.contains_key("score_ci_low"));
    }

    #[test]
    fn intervals_on_request() {
        let catalog = Catalog::with_defaults();
        let out = evaluate(&Dataset::Records(records()), &["metrics.accuracy"], &catalog, true).unwrap();
        let accuracy = &out.global_scores["metrics.accuracy"];
        assert!(accuracy.contains_key("score_ci_low"));
        assert!(accuracy.contains_key("accuracy_ci_high"));
    }

    #[test]
    fn columns_stay_columns() {
        let mut columns = BTreeMap::new();
        columns.insert("prediction".to_string(), vec![json!("x"), json!("y")]);
        columns.insert("references".to_string(), vec![json!(["x"]), json!(["z"])]);
        let dataset = Dataset::Columns(ColumnarTable { columns });

        let out = evaluate(&dataset, &["metrics.accuracy"], &Catalog::with_defaults(), false).unwrap();
        let Dataset::Columns(table) = &out.dataset else {
            panic!("expected columns");
        };
        assert_eq!(table.num_rows().unwrap(), 2);
        let scores = &table.columns["metrics.accuracy"];
        assert_eq!(scores[0]["score"], json!(1.0));
        assert_eq!(scores[1]["score"], json!(0.0));
        assert_eq!(out.global_scores["metrics.accuracy"].number("score"), Some(0.5));
    }

    #[test]
    fn ragged_columns_and_unknown_metrics_fail() {
        let mut columns = BTreeMap::new();
        columns.insert("prediction".to_string(), vec![json!("x")]);
        columns.insert("references".to_string(), vec![]);
        let ragged = Dataset::Columns(ColumnarTable { columns });
        let catalog = Catalog::with_defaults();
        assert!(matches!(
            evaluate(&ragged, &["metrics.accuracy"], &catalog, false),
            Err(EvalError::Format(_))
        ));
        assert!(matches!(
            evaluate(&Dataset::Records(records()), &["metrics.unknown"], &catalog, false),
            Err(EvalError::UnknownArtifact(_))
        ));
    }
}
