use crate::config::Choice;
use crate::error::{EvalError, Result};
use crate::evaluation::confidence::{DEFAULT_CONFIDENCE_LEVEL, DEFAULT_SEED};
use crate::evaluation::metrics::{
    Accuracy, ConfidenceConfig, F1, F1Average, F1MultiLabel, GlobalMetric, GlobalScorer,
    InstanceMetric, InstanceScorer, KendallTau, Metric, RocAuc, Rouge, Squad, StringContainment,
    TokenOverlap,
};
use schemars::{JsonSchema, Schema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use strum_macros::{Display, EnumDiscriminants, EnumIter, EnumMessage, EnumString, IntoStaticStr};

fn default_confidence_level() -> f64 {
    DEFAULT_CONFIDENCE_LEVEL
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_average() -> F1Average {
    F1Average::Macro
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConfidenceParameters {
    #[serde(default)]
    #[schemars(
        title = "Resamples",
        description = "Bootstrap resamples; empty uses the metric default, 0 disables intervals"
    )]
    pub n_resamples: Option<usize>,

    #[serde(default = "default_confidence_level")]
    #[schemars(
        title = "Confidence Level",
        range(min = 0.0, max = 1.0),
        default = "default_confidence_level"
    )]
    pub confidence_level: f64,

    #[serde(default = "default_seed")]
    #[schemars(title = "Seed", description = "Bootstrap PRNG seed", default = "default_seed")]
    pub seed: u64,
}

impl Default for ConfidenceParameters {
    fn default() -> Self {
        Self {
            n_resamples: None,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            seed: DEFAULT_SEED,
        }
    }
}

impl ConfidenceParameters {
    fn resolve(&self, default_resamples: usize) -> Result<ConfidenceConfig> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(EvalError::config(format!(
                "confidence_level must lie in (0, 1), got {}",
                self.confidence_level
            )));
        }
        Ok(ConfidenceConfig {
            n_resamples: Some(self.n_resamples.unwrap_or(default_resamples)),
            confidence_level: self.confidence_level,
            seed: self.seed,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InstanceMetricParameters {
    #[serde(flatten)]
    pub confidence: ConfidenceParameters,

    #[serde(default)]
    #[schemars(
        title = "Reduction Map",
        description = "e.g. {\"mean\": [\"f1\"]} or {\"group_mean\": {\"agg_func\": [...]}}"
    )]
    pub reduction_map: Option<Value>,

    #[serde(default)]
    #[schemars(title = "Subgroup Column", description = "task_data key naming the variant type")]
    pub subgroup_column: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GlobalMetricParameters {
    #[serde(flatten)]
    pub confidence: ConfidenceParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct F1Parameters {
    #[serde(default = "default_average")]
    #[schemars(title = "Average", default = "default_average")]
    pub average: F1Average,

    #[serde(flatten)]
    pub confidence: ConfidenceParameters,
}

impl Default for F1Parameters {
    fn default() -> Self {
        Self {
            average: default_average(),
            confidence: ConfidenceParameters::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, EnumDiscriminants)]
#[serde(tag = "type", content = "params", rename_all = "kebab-case")]
#[strum_discriminants(name(MetricKind))]
#[strum_discriminants(derive(EnumIter, EnumString, Display, IntoStaticStr, EnumMessage))]
#[strum_discriminants(strum(serialize_all = "kebab-case"))]
pub enum MetricChoice {
    #[strum_discriminants(strum(message = "Accuracy", detailed_message = "Exact match against any reference."))]
    Accuracy(InstanceMetricParameters),

    #[strum_discriminants(strum(
        message = "String Containment",
        detailed_message = "Some reference occurs inside the prediction."
    ))]
    StringContainment(InstanceMetricParameters),

    #[strum_discriminants(strum(
        message = "Token Overlap",
        detailed_message = "Normalized token precision, recall and F1."
    ))]
    TokenOverlap(InstanceMetricParameters),

    #[strum_discriminants(strum(message = "SQuAD", detailed_message = "Exact match and token F1, in percent."))]
    Squad(GlobalMetricParameters),

    #[strum_discriminants(strum(message = "F1", detailed_message = "Single-label F1 with macro, micro or weighted averaging."))]
    F1(F1Parameters),

    #[strum_discriminants(strum(message = "Multi-label F1", detailed_message = "F1 over label lists, macro or micro averaged."))]
    F1MultiLabel(F1Parameters),

    #[strum_discriminants(strum(message = "ROUGE", detailed_message = "ROUGE-1/2/L/Lsum F-measures."))]
    Rouge(GlobalMetricParameters),

    #[strum_discriminants(strum(message = "ROC AUC", detailed_message = "Area under the ROC curve."))]
    RocAuc(GlobalMetricParameters),

    #[strum_discriminants(strum(message = "Kendall tau-b", detailed_message = "Rank correlation with tie correction."))]
    KendalltauB(GlobalMetricParameters),
}

impl Choice for MetricChoice {
    type Kind = MetricKind;

    fn schema() -> Schema {
        schema_for!(MetricChoice)
    }

    fn default_params(kind: Self::Kind) -> anyhow::Result<Value> {
        let params = match kind {
            MetricKind::Accuracy | MetricKind::StringContainment | MetricKind::TokenOverlap => {
                serde_json::to_value(InstanceMetricParameters::default())?
            }
            MetricKind::F1 | MetricKind::F1MultiLabel => serde_json::to_value(F1Parameters::default())?,
            MetricKind::Squad | MetricKind::Rouge | MetricKind::RocAuc | MetricKind::KendalltauB => {
                serde_json::to_value(GlobalMetricParameters::default())?
            }
        };
        Ok(params)
    }
}

fn instance_metric<S: InstanceScorer + 'static>(
    scorer: S,
    params: InstanceMetricParameters,
) -> Result<Arc<dyn Metric>> {
    let confidence = params.confidence.resolve(ConfidenceConfig::INSTANCE_RESAMPLES)?;
    let mut metric = InstanceMetric::new(scorer).with_confidence(confidence);
    if let Some(reduction_map) = params.reduction_map {
        metric = metric.with_reduction_map(reduction_map);
    }
    if let Some(column) = params.subgroup_column {
        metric = metric.with_subgroup_column(column);
    }
    Ok(Arc::new(metric))
}

fn global_metric<S: GlobalScorer + 'static>(
    scorer: S,
    params: &ConfidenceParameters,
) -> Result<Arc<dyn Metric>> {
    let confidence = params.resolve(ConfidenceConfig::GLOBAL_RESAMPLES)?;
    Ok(Arc::new(GlobalMetric::new(scorer).with_confidence(confidence)))
}

impl MetricChoice {
    /// Parses a `{"type": ..., "params": ...}` document.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| EvalError::config(format!("invalid metric config: {e}")))
    }

    pub fn build(self) -> Result<Arc<dyn Metric>> {
        match self {
            MetricChoice::Accuracy(p) => instance_metric(Accuracy, p),
            MetricChoice::StringContainment(p) => instance_metric(StringContainment, p),
            MetricChoice::TokenOverlap(p) => instance_metric(TokenOverlap, p),
            MetricChoice::Squad(p) => global_metric(Squad, &p.confidence),
            MetricChoice::F1(p) => global_metric(F1::new(p.average), &p.confidence),
            MetricChoice::F1MultiLabel(p) => match p.average {
                F1Average::Macro => global_metric(F1MultiLabel::macro_average(), &p.confidence),
                F1Average::Micro => global_metric(F1MultiLabel::micro_average(), &p.confidence),
                F1Average::Weighted => Err(EvalError::config(
                    "multi-label F1 supports macro and micro averaging only",
                )),
            },
            MetricChoice::Rouge(p) => global_metric(Rouge, &p.confidence),
            MetricChoice::RocAuc(p) => global_metric(RocAuc, &p.confidence),
            MetricChoice::KendalltauB(p) => global_metric(KendallTau, &p.confidence),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{GROUPED_PREDICTIONS, GROUPED_REFERENCES, apply_metric, grouped_task_data};
    use serde_json::json;
    use strum::IntoEnumIterator;

    #[test]
    fn every_kind_builds_from_defaults() {
        for kind in MetricKind::iter() {
            let choice = MetricChoice::with_defaults(kind).unwrap();
            let metric = choice.build().unwrap();
            assert!(!metric.main_score().is_empty());
        }
    }

    #[test]
    fn kinds_are_kebab_case_and_described() {
        let kinds = MetricChoice::kinds();
        assert!(kinds.contains(&("string-containment", "String Containment")));
        assert!(kinds.contains(&("kendalltau-b", "Kendall tau-b")));
    }

    #[test]
    fn resample_defaults_follow_the_metric_family() {
        let instance = ConfidenceParameters::default()
            .resolve(ConfidenceConfig::INSTANCE_RESAMPLES)
            .unwrap();
        assert_eq!(instance.n_resamples, Some(1000));
        let disabled = ConfidenceParameters {
            n_resamples: Some(0),
            ..Default::default()
        };
        assert_eq!(disabled.resolve(100).unwrap().n_resamples, Some(0));
    }

    #[test]
    fn grouped_metric_from_json() {
        let choice = MetricChoice::from_value(json!({
            "type": "accuracy",
            "params": {
                "n_resamples": 10,
                "reduction_map": {"group_mean": {"agg_func": ["pdr_paraphrase", "performance_drop_rate", true]}}
            }
        }))
        .unwrap();
        let out = apply_metric(
            choice.build().unwrap(),
            json!(GROUPED_PREDICTIONS),
            json!(GROUPED_REFERENCES),
            Some(grouped_task_data()),
        )
        .unwrap();
        let global = &out[0].score().unwrap().global;
        assert_eq!(global.text("score_name"), Some("fixed_group_pdr_paraphrase_accuracy"));
        assert!((global.number("score").unwrap() - 0.8333333333333334).abs() < 1e-9);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let bad_level = MetricChoice::from_value(json!({
            "type": "rouge",
            "params": {"confidence_level": 1.5}
        }))
        .unwrap();
        assert!(matches!(bad_level.build(), Err(EvalError::Config(_))));

        let weighted = MetricChoice::from_value(json!({
            "type": "f1-multi-label",
            "params": {"average": "weighted"}
        }))
        .unwrap();
        assert!(matches!(weighted.build(), Err(EvalError::Config(_))));

        assert!(matches!(
            MetricChoice::from_value(json!({"type": "bleu", "params": {}})),
            Err(EvalError::Config(_))
        ));
    }

    #[test]
    fn f1_average_is_selectable() {
        let choice = MetricChoice::from_value(json!({"type": "f1", "params": {"average": "micro"}})).unwrap();
        assert_eq!(choice.build().unwrap().main_score(), "f1_micro");
    }
}
