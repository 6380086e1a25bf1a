use crate::catalog::Catalog;
use crate::error::Result;
use crate::operators::{ApplyToInstances, InstanceOperator, StreamOperator};
use crate::streams::MultiStream;
use std::sync::Arc;

/// A pipeline step before resolution: a ready operator or a catalog name.
#[derive(Clone)]
pub enum Step {
    Operator(Arc<dyn StreamOperator>),
    Named(String),
}

impl Step {
    pub fn operator<O: StreamOperator + 'static>(operator: O) -> Self {
        Step::Operator(Arc::new(operator))
    }

    /// Lifts an instance operator to all partitions.
    pub fn instance<O: InstanceOperator + 'static>(operator: O) -> Self {
        Step::Operator(Arc::new(ApplyToInstances::new(operator)))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Step::Named(name.into())
    }
}

/// Runs its steps in order, feeding each step the output of the previous.
///
/// Named steps are resolved against a [`Catalog`] once, when the pipeline is
/// built; applying the pipeline has no lookup side effects.
#[derive(Clone, Default)]
pub struct SequentialOperator {
    steps: Vec<Arc<dyn StreamOperator>>,
}

impl SequentialOperator {
    pub fn new(steps: Vec<Arc<dyn StreamOperator>>) -> Self {
        Self { steps }
    }

    pub fn resolve(steps: Vec<Step>, catalog: &Catalog) -> Result<Self> {
        let steps = steps
            .into_iter()
            .map(|step| match step {
                Step::Operator(op) => Ok(op),
                Step::Named(name) => catalog.operator(&name),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { steps })
    }

    pub fn push(&mut self, step: Arc<dyn StreamOperator>) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl StreamOperator for SequentialOperator {
    fn apply(&self, multi_stream: MultiStream) -> Result<MultiStream> {
        self.steps
            .iter()
            .try_fold(multi_stream, |ms, step| step.apply(ms))
    }
}
