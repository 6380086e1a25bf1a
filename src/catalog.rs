use crate::error::{EvalError, Result};
use crate::evaluation::metrics::{
    Accuracy, F1, F1MultiLabel, GlobalMetric, GlobalScorer, GroupAggregation, GroupReduction,
    InstanceMetric, InstanceScorer, KendallTau, Metric, MetricOperator, RocAuc, Rouge, Squad,
    StringContainment, TokenOverlap,
};
use crate::operators::{Processor, StreamOperator};
use std::collections::BTreeMap;
use std::sync::Arc;
use strum::IntoEnumIterator;

pub const METRICS_PREFIX: &str = "metrics.";

/// A shared, immutable catalog entry.
#[derive(Clone)]
pub enum Artifact {
    Operator(Arc<dyn StreamOperator>),
    Metric(Arc<dyn Metric>),
}

/// Name to artifact registry. Every lookup of a name returns the same
/// shared artifact.
#[derive(Clone, Default)]
pub struct Catalog {
    artifacts: BTreeMap<String, Artifact>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in metric under `metrics.<name>` and every post-processor
    /// under `processors.<name>`.
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        catalog.add_instance_metric(Accuracy);
        catalog.add_instance_metric(StringContainment);
        catalog.add_instance_metric(TokenOverlap);

        for aggregation in GroupAggregation::iter() {
            catalog.add_grouped_metric(Accuracy, aggregation, true);
            catalog.add_grouped_metric(StringContainment, aggregation, true);
        }
        catalog.add_grouped_metric(Accuracy, GroupAggregation::Mean, false);
        catalog.add_grouped_metric(StringContainment, GroupAggregation::Mean, false);
        catalog.add_grouped_metric(TokenOverlap, GroupAggregation::Mean, false);

        catalog.add_global_metric(Squad);
        catalog.add_global_metric(F1::macro_average());
        catalog.add_global_metric(F1::micro_average());
        catalog.add_global_metric(F1::weighted());
        catalog.add_global_metric(F1MultiLabel::macro_average());
        catalog.add_global_metric(F1MultiLabel::micro_average());
        catalog.add_global_metric(Rouge);
        catalog.add_global_metric(RocAuc);
        catalog.add_global_metric(KendallTau);

        for processor in Processor::iter() {
            catalog.add_operator(processor.catalog_name(), Arc::new(processor.as_postprocessing()));
        }
        catalog
    }

    pub fn add_metric(&mut self, name: impl Into<String>, metric: Arc<dyn Metric>) {
        self.artifacts.insert(name.into(), Artifact::Metric(metric));
    }

    pub fn add_operator(&mut self, name: impl Into<String>, operator: Arc<dyn StreamOperator>) {
        self.artifacts.insert(name.into(), Artifact::Operator(operator));
    }

    fn add_instance_metric<S: InstanceScorer + 'static>(&mut self, scorer: S) {
        let name = format!("{METRICS_PREFIX}{}", scorer.name());
        self.add_metric(name, Arc::new(InstanceMetric::new(scorer)));
    }

    /// Registered as `metrics.{fixed_group|group}_{label}_{scorer}`.
    fn add_grouped_metric<S: InstanceScorer + 'static>(
        &mut self,
        scorer: S,
        aggregation: GroupAggregation,
        resample_groups: bool,
    ) {
        let prefix = GroupReduction::new(aggregation, resample_groups, Vec::new()).score_prefix();
        let name = format!("{METRICS_PREFIX}{prefix}{}", scorer.name());
        self.add_metric(name, Arc::new(InstanceMetric::grouped(scorer, aggregation, resample_groups)));
    }

    fn add_global_metric<S: GlobalScorer + 'static>(&mut self, scorer: S) {
        let name = format!("{METRICS_PREFIX}{}", scorer.name());
        self.add_metric(name, Arc::new(GlobalMetric::new(scorer)));
    }

    pub fn get(&self, name: &str) -> Result<&Artifact> {
        self.artifacts
            .get(name)
            .ok_or_else(|| EvalError::UnknownArtifact(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.artifacts.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }

    pub fn metric(&self, name: &str) -> Result<Arc<dyn Metric>> {
        match self.get(name)? {
            Artifact::Metric(metric) => Ok(Arc::clone(metric)),
            Artifact::Operator(_) => Err(EvalError::config(format!(
                "artifact '{name}' is an operator, not a metric"
            ))),
        }
    }

    /// Operators are returned as registered; metrics are wrapped in a
    /// [`MetricOperator`] using their configured resampling.
    pub fn operator(&self, name: &str) -> Result<Arc<dyn StreamOperator>> {
        match self.get(name)? {
            Artifact::Operator(operator) => Ok(Arc::clone(operator)),
            Artifact::Metric(metric) => Ok(Arc::new(MetricOperator::new(Arc::clone(metric)))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_metrics_and_processors() {
        let catalog = Catalog::with_defaults();
        for name in [
            "metrics.accuracy",
            "metrics.string_containment",
            "metrics.token_overlap",
            "metrics.squad",
            "metrics.f1_macro",
            "metrics.f1_micro",
            "metrics.f1_weighted",
            "metrics.f1_macro_multi_label",
            "metrics.f1_micro_multi_label",
            "metrics.rouge",
            "metrics.roc_auc",
            "metrics.kendalltau_b",
            "metrics.group_mean_accuracy",
            "metrics.fixed_group_mean_accuracy",
            "metrics.group_mean_token_overlap",
            "metrics.fixed_group_pdr_paraphrase_string_containment",
            "metrics.fixed_group_absval_norm_hedges_g_paraphrase_accuracy",
            "processors.lower_case",
            "processors.take_first_word",
            "processors.hate_speech_or_not_hate_speech",
            "processors.toxic_or_not_toxic",
            "processors.stance_to_pro_con",
            "processors.remove_none_from_list",
        ] {
            assert!(catalog.contains(name), "missing {name}");
        }
    }

    #[test]
    fn lookups_share_one_artifact() {
        let catalog = Catalog::with_defaults();
        let a = catalog.metric("metrics.accuracy").unwrap();
        let b = catalog.metric("metrics.accuracy").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.main_score(), "accuracy");
    }

    #[test]
    fn kind_mismatch_and_unknown_names() {
        let catalog = Catalog::with_defaults();
        assert!(matches!(
            catalog.metric("processors.lower_case"),
            Err(EvalError::Config(_))
        ));
        assert!(catalog.operator("metrics.accuracy").is_ok());
        assert!(matches!(
            catalog.metric("metrics.nope"),
            Err(EvalError::UnknownArtifact(ref n)) if n == "metrics.nope"
        ));
    }
}
