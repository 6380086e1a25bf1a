use crate::core::instances::{Instance, Scores};
use crate::error::Result;
use crate::evaluation::confidence::{Bootstrap, DEFAULT_CONFIDENCE_LEVEL, DEFAULT_SEED};
use crate::operators::StreamOperator;
use crate::streams::MultiStream;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Per-call override of a metric's configured resample count.
///
/// Metrics are shared and immutable; callers that want intervals disabled
/// (or a different resample count) for one run pass it here instead of
/// changing the metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resampling {
    #[default]
    Configured,
    Disabled,
    Fixed(usize),
}

impl Resampling {
    pub fn resolve(self, configured: Option<usize>) -> Option<usize> {
        match self {
            Resampling::Configured => configured,
            Resampling::Disabled => None,
            Resampling::Fixed(n) => Some(n),
        }
    }
}

/// Bootstrap settings carried by every metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConfidenceConfig {
    /// `None` disables confidence intervals.
    pub n_resamples: Option<usize>,
    pub confidence_level: f64,
    pub seed: u64,
}

impl ConfidenceConfig {
    pub const INSTANCE_RESAMPLES: usize = 1000;
    pub const GLOBAL_RESAMPLES: usize = 100;

    pub fn instance_default() -> Self {
        Self::with_resamples(Some(Self::INSTANCE_RESAMPLES))
    }

    pub fn global_default() -> Self {
        Self::with_resamples(Some(Self::GLOBAL_RESAMPLES))
    }

    pub fn with_resamples(n_resamples: Option<usize>) -> Self {
        Self {
            n_resamples,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            seed: DEFAULT_SEED,
        }
    }

    /// The bootstrap to run for `num_units` units, if any. Intervals need more
    /// than one resample and more than one unit.
    pub fn bootstrap(&self, resampling: Resampling, num_units: usize) -> Option<Bootstrap> {
        let n = resampling.resolve(self.n_resamples)?;
        if n <= 1 || num_units <= 1 {
            return None;
        }
        Some(Bootstrap::new(n, self.confidence_level, self.seed))
    }
}

/// A configured metric: scores every instance of one stream and attaches
/// the aggregate to each of them.
///
/// After [`score_instances`](Metric::score_instances) each instance carries
/// `score.instance` (its own scores, merged into any earlier ones) and
/// `score.global` (the aggregate over the whole stream, merged into any
/// earlier global scores). Both mappings hold `score` and `score_name`.
pub trait Metric: Send + Sync {
    fn main_score(&self) -> &str;

    fn confidence(&self) -> &ConfidenceConfig;

    fn score_instances(&self, instances: Vec<Instance>, resampling: Resampling) -> Result<Vec<Instance>>;
}

/// Global scores already present on a stream (from an earlier metric).
pub(crate) fn existing_global(instances: &[Instance]) -> Scores {
    instances
        .iter()
        .find_map(|i| i.score())
        .map(|record| record.global.clone())
        .unwrap_or_default()
}

pub(crate) fn attach_global(instances: &mut [Instance], global: &Scores) {
    for instance in instances {
        instance.score_mut().global = global.clone();
    }
}

/// Runs a metric over every partition of a multi-stream.
///
/// Scoring needs the whole partition, so each stream is materialized when it
/// is first iterated.
#[derive(Clone)]
pub struct MetricOperator {
    metric: Arc<dyn Metric>,
    resampling: Resampling,
}

impl MetricOperator {
    pub fn new(metric: Arc<dyn Metric>) -> Self {
        Self {
            metric,
            resampling: Resampling::Configured,
        }
    }

    pub fn with_resampling(mut self, resampling: Resampling) -> Self {
        self.resampling = resampling;
        self
    }
}

impl StreamOperator for MetricOperator {
    fn apply(&self, multi_stream: MultiStream) -> Result<MultiStream> {
        multi_stream.map_streams(|name, stream| {
            let metric = Arc::clone(&self.metric);
            let resampling = self.resampling;
            let stream_name = name.to_string();
            Ok(stream.transform_all(move |instances| {
                debug!(
                    metric = metric.main_score(),
                    stream = %stream_name,
                    instances = instances.len(),
                    "scoring stream"
                );
                metric.score_instances(instances, resampling)
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resampling_overrides() {
        assert_eq!(Resampling::Configured.resolve(Some(5)), Some(5));
        assert_eq!(Resampling::Disabled.resolve(Some(5)), None);
        assert_eq!(Resampling::Fixed(3).resolve(None), Some(3));
    }

    #[test]
    fn bootstrap_needs_resamples_and_units() {
        let c = ConfidenceConfig::global_default();
        assert!(c.bootstrap(Resampling::Configured, 10).is_some());
        assert!(c.bootstrap(Resampling::Configured, 1).is_none());
        assert!(c.bootstrap(Resampling::Fixed(1), 10).is_none());
        assert!(c.bootstrap(Resampling::Disabled, 10).is_none());
        assert_eq!(
            c.bootstrap(Resampling::Configured, 10).unwrap().n_resamples(),
            ConfidenceConfig::GLOBAL_RESAMPLES
        );
    }
}
