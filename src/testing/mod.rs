pub mod fixtures;
pub mod stubs;

pub use fixtures::{GROUPED_PREDICTIONS, GROUPED_REFERENCES, grouped_task_data};

use crate::core::instances::{Instance, PREDICTION_FIELD, REFERENCES_FIELD, TASK_DATA_FIELD};
use crate::error::{EvalError, Result};
use crate::evaluation::metrics::{Metric, MetricOperator, Resampling};
use crate::operators::StreamOperator;
use crate::streams::MultiStream;
use serde_json::Value;
use std::sync::Arc;

const TEST_SPLIT: &str = "test";

fn values(value: Value, what: &str) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(EvalError::format(format!("{what} must be a list, got {other}"))),
    }
}

/// Builds one instance per prediction from parallel lists.
pub fn metric_inputs(predictions: Value, references: Value, task_data: Option<Value>) -> Result<Vec<Instance>> {
    let predictions = values(predictions, "predictions")?;
    let references = values(references, "references")?;
    let task_data: Vec<Option<Value>> = match task_data {
        Some(task_data) => values(task_data, "task_data")?.into_iter().map(Some).collect(),
        None => vec![None; predictions.len()],
    };
    if references.len() != predictions.len() || task_data.len() != predictions.len() {
        return Err(EvalError::format("predictions, references and task_data differ in length"));
    }
    Ok(predictions
        .into_iter()
        .zip(references)
        .zip(task_data)
        .map(|((prediction, references), task_data)| {
            let instance = Instance::new()
                .with(PREDICTION_FIELD, prediction)
                .with(REFERENCES_FIELD, references);
            match task_data {
                Some(task_data) => instance.with(TASK_DATA_FIELD, task_data),
                None => instance,
            }
        })
        .collect())
}

/// Runs `metric` over a single `"test"` partition and returns the scored
/// instances.
pub fn apply_metric(
    metric: Arc<dyn Metric>,
    predictions: Value,
    references: Value,
    task_data: Option<Value>,
) -> Result<Vec<Instance>> {
    apply_metric_with(metric, Resampling::Configured, predictions, references, task_data)
}

pub fn apply_metric_with(
    metric: Arc<dyn Metric>,
    resampling: Resampling,
    predictions: Value,
    references: Value,
    task_data: Option<Value>,
) -> Result<Vec<Instance>> {
    let instances = metric_inputs(predictions, references, task_data)?;
    run(metric, resampling, instances)
}

pub fn apply_metric_to_instances(metric: Arc<dyn Metric>, instances: Vec<Instance>) -> Result<Vec<Instance>> {
    run(metric, Resampling::Configured, instances)
}

fn run(metric: Arc<dyn Metric>, resampling: Resampling, instances: Vec<Instance>) -> Result<Vec<Instance>> {
    let operator = MetricOperator::new(metric).with_resampling(resampling);
    let input = MultiStream::from_iterables([(TEST_SPLIT, instances)], true);
    operator.apply(input)?.stream(TEST_SPLIT)?.collect_instances()
}
