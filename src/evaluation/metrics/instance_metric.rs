use crate::core::instances::{Instance, Scores};
use crate::error::{EvalError, Result};
use crate::evaluation::confidence::score_intervals;
use crate::evaluation::metrics::metric::{
    ConfidenceConfig, Metric, Resampling, attach_global, existing_global,
};
use crate::evaluation::metrics::reduction::{
    GROUP_MEAN_REDUCTION, GroupAggregation, GroupReduction, MEAN_REDUCTION, Reduction,
    SUBGROUP_COLUMN, parse_reductions,
};
use crate::utils::math::nan_mean;
use crate::utils::text::value_to_text;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use tracing::debug;

/// Task-data key grouping instances for `group_mean` reductions.
pub const GROUP_ID_FIELD: &str = "group_id";

/// Scores a single `(references, prediction)` pair.
pub trait InstanceScorer: Send + Sync {
    /// Catalog name of the plain metric, e.g. `accuracy`.
    fn name(&self) -> &str;

    fn main_score(&self) -> &str;

    /// Scores that get confidence intervals and a default mean reduction.
    fn ci_scores(&self) -> Vec<String> {
        vec![self.main_score().to_string()]
    }

    fn compute(
        &self,
        references: &[Value],
        prediction: &Value,
        task_data: &Map<String, Value>,
    ) -> Result<Scores>;
}

/// A metric scored instance by instance and reduced to a global score by
/// the reductions of its reduction map.
#[derive(Debug, Clone)]
pub struct InstanceMetric<S> {
    scorer: S,
    confidence: ConfidenceConfig,
    reduction_map: Value,
    subgroup_column: Option<String>,
    implemented_reductions: Vec<String>,
}

impl<S: InstanceScorer> InstanceMetric<S> {
    pub fn new(scorer: S) -> Self {
        let reduction_map = json!({ MEAN_REDUCTION: scorer.ci_scores() });
        Self {
            scorer,
            confidence: ConfidenceConfig::instance_default(),
            reduction_map,
            subgroup_column: None,
            implemented_reductions: vec![MEAN_REDUCTION.to_string(), GROUP_MEAN_REDUCTION.to_string()],
        }
    }

    /// A `group_mean` variant over the scorer's interval scores. Comparison
    /// aggregations read subgroups from the `variant_type` task-data key.
    pub fn grouped(scorer: S, aggregation: GroupAggregation, resample_groups: bool) -> Self {
        let fields = scorer.ci_scores();
        let reduction = GroupReduction::new(aggregation, resample_groups, fields);
        let metric = Self::new(scorer).with_reduction_map(reduction.to_value());
        if aggregation.needs_subgroups() {
            metric.with_subgroup_column(SUBGROUP_COLUMN)
        } else {
            metric
        }
    }

    pub fn with_confidence(mut self, confidence: ConfidenceConfig) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_n_resamples(mut self, n_resamples: Option<usize>) -> Self {
        self.confidence.n_resamples = n_resamples;
        self
    }

    /// Raw reduction map; it is validated when the metric is applied.
    pub fn with_reduction_map(mut self, reduction_map: Value) -> Self {
        self.reduction_map = reduction_map;
        self
    }

    pub fn with_subgroup_column(mut self, column: impl Into<String>) -> Self {
        self.subgroup_column = Some(column.into());
        self
    }

    pub fn with_implemented_reductions<I, T>(mut self, reductions: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.implemented_reductions = reductions.into_iter().map(Into::into).collect();
        self
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    fn group_key(&self, task_data: &Map<String, Value>, reduction: &GroupReduction) -> Result<GroupKey> {
        let id = task_data.get(GROUP_ID_FIELD).ok_or_else(|| {
            EvalError::format(format!(
                "each instance task_data dict must have a key {GROUP_ID_FIELD}"
            ))
        })?;
        let subgroup = if reduction.aggregation.needs_subgroups() {
            let column = self.subgroup_column.as_deref().ok_or_else(|| {
                EvalError::config(format!(
                    "aggregation {} compares subgroups and needs a subgroup_column",
                    reduction.label
                ))
            })?;
            let value = task_data.get(column).ok_or_else(|| {
                EvalError::format(format!("each instance task_data dict must have a key {column}"))
            })?;
            Some(value_to_text(value))
        } else {
            None
        };
        Ok(GroupKey {
            id: value_to_text(id),
            subgroup,
        })
    }

    fn interval_fields(&self, fields: &[String]) -> Vec<String> {
        self.scorer
            .ci_scores()
            .into_iter()
            .filter(|name| fields.contains(name))
            .collect()
    }

    fn reduce(
        &self,
        reduction: &Reduction,
        units: &[ScoredUnit],
        resampling: Resampling,
        global: &mut Scores,
    ) -> Result<()> {
        let main = self.scorer.main_score();
        match reduction {
            Reduction::Mean { fields } => {
                for field in fields {
                    let value = nan_mean(units.iter().map(|u| u.value(field)));
                    global.insert(field.clone(), value);
                    if field == main {
                        global.insert("score", value);
                        global.insert("score_name", field.clone());
                    }
                }
                if let Some(bootstrap) = self.confidence.bootstrap(resampling, units.len()) {
                    global.extend(score_intervals(
                        units,
                        &self.interval_fields(fields),
                        ScoredUnit::value,
                        |sample, name| nan_mean(sample.iter().map(|u| u.value(name))),
                        &bootstrap,
                        main,
                        "",
                    ));
                }
            }
            Reduction::GroupMean(group) => {
                let prefix = group.score_prefix();
                let groups = group_units(units.iter());
                for field in &group.fields {
                    let value = aggregate_groups(&groups, group.aggregation, field)?;
                    global.insert(format!("{prefix}{field}"), value);
                    if field == main {
                        global.insert("score", value);
                        global.insert("score_name", format!("{prefix}{field}"));
                    }
                }
                let ci_fields = self.interval_fields(&group.fields);
                if group.resample_groups {
                    let per_group = group_values(&groups, group.aggregation, &ci_fields)?;
                    if let Some(bootstrap) = self.confidence.bootstrap(resampling, per_group.len()) {
                        global.extend(score_intervals(
                            &per_group,
                            &ci_fields,
                            |g, name| g.number(name).unwrap_or(f64::NAN),
                            |sample, name| {
                                nan_mean(sample.iter().map(|g| g.number(name).unwrap_or(f64::NAN)))
                            },
                            &bootstrap,
                            main,
                            &prefix,
                        ));
                    }
                } else if let Some(bootstrap) = self.confidence.bootstrap(resampling, units.len()) {
                    global.extend(score_intervals(
                        units,
                        &ci_fields,
                        ScoredUnit::value,
                        |sample, name| {
                            let regrouped = group_units(sample.iter().copied());
                            aggregate_groups(&regrouped, group.aggregation, name).unwrap_or(f64::NAN)
                        },
                        &bootstrap,
                        main,
                        &prefix,
                    ));
                }
            }
        }
        Ok(())
    }
}

impl<S: InstanceScorer> Metric for InstanceMetric<S> {
    fn main_score(&self) -> &str {
        self.scorer.main_score()
    }

    fn confidence(&self) -> &ConfidenceConfig {
        &self.confidence
    }

    fn score_instances(&self, mut instances: Vec<Instance>, resampling: Resampling) -> Result<Vec<Instance>> {
        let reductions = parse_reductions(
            &self.reduction_map,
            &self.implemented_reductions,
            &self.scorer.ci_scores(),
        )?;
        let grouping = reductions.iter().find_map(|r| match r {
            Reduction::GroupMean(group) => Some(group),
            Reduction::Mean { .. } => None,
        });
        let main = self.scorer.main_score();
        let mut global = existing_global(&instances);

        let mut units = Vec::with_capacity(instances.len());
        for instance in &mut instances {
            let task_data = instance.task_data()?.cloned().unwrap_or_default();
            let mut scores = self
                .scorer
                .compute(instance.references()?, instance.prediction()?, &task_data)?;
            scores.insert("score", scores.number(main).unwrap_or(f64::NAN));
            scores.insert("score_name", main);
            let group = grouping
                .map(|reduction| self.group_key(&task_data, reduction))
                .transpose()?;
            instance.score_mut().instance.extend(scores.clone());
            units.push(ScoredUnit { scores, group });
        }

        for reduction in &reductions {
            debug!(metric = self.scorer.name(), ?reduction, units = units.len(), "reducing scores");
            self.reduce(reduction, &units, resampling, &mut global)?;
        }
        attach_global(&mut instances, &global);
        Ok(instances)
    }
}

#[derive(Debug, Clone)]
struct GroupKey {
    id: String,
    subgroup: Option<String>,
}

#[derive(Debug, Clone)]
struct ScoredUnit {
    scores: Scores,
    group: Option<GroupKey>,
}

impl ScoredUnit {
    fn value(&self, field: &str) -> f64 {
        self.scores.number(field).unwrap_or(f64::NAN)
    }

    fn subgroup(&self) -> Option<&str> {
        self.group.as_ref().and_then(|g| g.subgroup.as_deref())
    }
}

fn group_units<'a>(units: impl Iterator<Item = &'a ScoredUnit>) -> BTreeMap<&'a str, Vec<&'a ScoredUnit>> {
    let mut groups: BTreeMap<&str, Vec<&ScoredUnit>> = BTreeMap::new();
    for unit in units {
        if let Some(key) = &unit.group {
            groups.entry(key.id.as_str()).or_default().push(unit);
        }
    }
    groups
}

fn aggregate_group(members: &[&ScoredUnit], aggregation: GroupAggregation, field: &str) -> Result<f64> {
    let pairs: Vec<(f64, Option<&str>)> = members
        .iter()
        .map(|u| (u.value(field), u.subgroup()))
        .collect();
    aggregation.aggregate(&pairs)
}

/// Per-group values averaged across groups, skipping NaN groups.
fn aggregate_groups(
    groups: &BTreeMap<&str, Vec<&ScoredUnit>>,
    aggregation: GroupAggregation,
    field: &str,
) -> Result<f64> {
    let values = groups
        .values()
        .map(|members| aggregate_group(members, aggregation, field))
        .collect::<Result<Vec<_>>>()?;
    Ok(nan_mean(values))
}

fn group_values(
    groups: &BTreeMap<&str, Vec<&ScoredUnit>>,
    aggregation: GroupAggregation,
    fields: &[String],
) -> Result<Vec<Scores>> {
    groups
        .values()
        .map(|members| {
            let mut scores = Scores::new();
            for field in fields {
                scores.insert(field.clone(), aggregate_group(members, aggregation, field)?);
            }
            Ok(scores)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::metrics::text::{Accuracy, StringContainment, TokenOverlap};
    use crate::testing::{
        GROUPED_PREDICTIONS, GROUPED_REFERENCES, apply_metric, apply_metric_with, grouped_task_data,
    };
    use std::sync::Arc;
    use strum::IntoEnumIterator;

    fn global_score(metric: impl Metric + 'static) -> f64 {
        let out = apply_metric(
            Arc::new(metric),
            json!(GROUPED_PREDICTIONS),
            json!(GROUPED_REFERENCES),
            Some(grouped_task_data()),
        )
        .unwrap();
        out[0].score().unwrap().global.number("score").unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-6, "{actual} != {expected}");
    }

    #[test]
    fn accuracy_instance_and_global_scores() {
        let out = apply_metric(
            Arc::new(InstanceMetric::new(Accuracy)),
            json!(["A", "B", "C"]),
            json!([["B", "C"], ["A"], ["B", "C"]]),
            None,
        )
        .unwrap();
        let global = &out[0].score().unwrap().global;
        assert_close(global.number("accuracy").unwrap(), 1.0 / 3.0);
        assert_close(global.number("score").unwrap(), 1.0 / 3.0);
        assert_eq!(global.text("score_name"), Some("accuracy"));

        let instance_scores: Vec<f64> = out
            .iter()
            .map(|i| i.score().unwrap().instance.number("score").unwrap())
            .collect();
        assert_eq!(instance_scores, vec![0.0, 0.0, 1.0]);
        assert_eq!(out[2].score().unwrap().instance.len(), 3);
    }

    #[test]
    fn token_overlap_reduces_every_measure() {
        let out = apply_metric(
            Arc::new(InstanceMetric::new(TokenOverlap)),
            json!(["hello there general dude", "foo bar foobar"]),
            json!([["hello there general kenobi", "hello there!"], ["foo bar foobar", "foo bar"]]),
            None,
        )
        .unwrap();
        let global = &out[0].score().unwrap().global;
        assert_close(global.number("f1").unwrap(), 7.0 / 8.0);
        assert_close(global.number("precision").unwrap(), 7.0 / 8.0);
        assert_close(global.number("recall").unwrap(), 1.0);
    }

    #[test]
    fn grouped_accuracy_targets() {
        let targets = [
            (GroupAggregation::Mean, 0.225),
            (GroupAggregation::MeanBaseline, 0.5),
            (GroupAggregation::MeanParaphrase, 0.19444444444444442),
            (GroupAggregation::NormalizedCohensH, -0.4249467048786864),
            (GroupAggregation::PerformanceDropRate, 0.8333333333333334),
            (GroupAggregation::NormalizedHedgesG, -0.34565986391520215),
            (GroupAggregation::AbsvalNormalizedCohensH, 0.6471689271009087),
            (GroupAggregation::AbsvalNormalizedHedgesG, 0.3832160660602437),
        ];
        for (aggregation, target) in targets {
            assert_close(global_score(InstanceMetric::grouped(Accuracy, aggregation, true)), target);
        }
        assert_close(global_score(InstanceMetric::grouped(Accuracy, GroupAggregation::Mean, false)), 0.225);
    }

    #[test]
    fn grouped_string_containment_targets() {
        let targets = [
            (GroupAggregation::Mean, 0.4875),
            (GroupAggregation::MeanBaseline, 0.75),
            (GroupAggregation::MeanParaphrase, 0.5555555555555555),
            (GroupAggregation::NormalizedCohensH, -0.4639421840102023),
            (GroupAggregation::PerformanceDropRate, 0.4444444444444445),
            (GroupAggregation::NormalizedHedgesG, -0.08060156608173413),
            (GroupAggregation::AbsvalNormalizedCohensH, 0.4639421840102023),
            (GroupAggregation::AbsvalNormalizedHedgesG, 0.08060156608173413),
        ];
        for (aggregation, target) in targets {
            assert_close(
                global_score(InstanceMetric::grouped(StringContainment, aggregation, true)),
                target,
            );
        }
        assert_close(
            global_score(InstanceMetric::grouped(StringContainment, GroupAggregation::Mean, false)),
            0.4875,
        );
    }

    #[test]
    fn grouped_token_overlap_reports_each_field() {
        let out = apply_metric(
            Arc::new(InstanceMetric::grouped(TokenOverlap, GroupAggregation::Mean, false)),
            json!(GROUPED_PREDICTIONS),
            json!(GROUPED_REFERENCES),
            Some(grouped_task_data()),
        )
        .unwrap();
        let global = &out[0].score().unwrap().global;
        assert_close(global.number("group_mean_f1").unwrap(), 0.5083333333333333);
        assert_close(global.number("group_mean_precision").unwrap(), 0.5);
        assert_close(global.number("group_mean_recall").unwrap(), 0.525);
        assert_eq!(global.text("score_name"), Some("group_mean_f1"));
        for name in ["f1", "precision", "recall"] {
            let low = global.number(&format!("group_mean_{name}_ci_low")).unwrap();
            let high = global.number(&format!("group_mean_{name}_ci_high")).unwrap();
            assert!(low <= high);
        }
        assert_eq!(global.number("score_ci_low"), global.number("group_mean_f1_ci_low"));
    }

    #[test]
    fn fixed_and_resampled_grouping_agree_on_point_estimates() {
        for aggregation in GroupAggregation::iter() {
            let fixed = global_score(InstanceMetric::grouped(Accuracy, aggregation, true));
            let resampled = global_score(InstanceMetric::grouped(Accuracy, aggregation, false));
            assert_close(fixed, resampled);
        }
    }

    #[test]
    fn grouped_score_names() {
        let out = apply_metric(
            Arc::new(InstanceMetric::grouped(Accuracy, GroupAggregation::PerformanceDropRate, true)),
            json!(GROUPED_PREDICTIONS),
            json!(GROUPED_REFERENCES),
            Some(grouped_task_data()),
        )
        .unwrap();
        let global = &out[0].score().unwrap().global;
        assert_eq!(global.text("score_name"), Some("fixed_group_pdr_paraphrase_accuracy"));
        assert!(global.contains_key("fixed_group_pdr_paraphrase_accuracy_ci_low"));
    }

    #[test]
    fn missing_group_id_is_a_format_error() {
        let err = apply_metric(
            Arc::new(InstanceMetric::grouped(Accuracy, GroupAggregation::Mean, true)),
            json!(["A", "B"]),
            json!([["A"], ["B"]]),
            Some(json!([{"group_id": "g1"}, {"variant_type": "original"}])),
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::Format(ref m) if m.contains("group_id")));
    }

    #[test]
    fn invalid_reduction_maps_fail_at_apply_time() {
        let maps = [
            json!({"group_mean": {"func": ["mean", "mean"]}}),
            json!({"group_mean": {"agg_func": ["mean", "some string", false]}}),
            json!({"group_mean": {"agg_func": ["mean", "mean", 1]}}),
        ];
        for map in maps {
            let metric = InstanceMetric::new(Accuracy).with_reduction_map(map);
            let err = apply_metric(
                Arc::new(metric),
                json!(GROUPED_PREDICTIONS),
                json!(GROUPED_REFERENCES),
                Some(grouped_task_data()),
            )
            .unwrap_err();
            assert!(matches!(err, EvalError::Config(_)));
        }

        let metric = InstanceMetric::new(Accuracy)
            .with_implemented_reductions(["mean", "group_mean", "some_other_func"])
            .with_reduction_map(json!({"some_other_func": {"agg_func": ["mean", "mean", false]}}));
        let err = apply_metric(Arc::new(metric), json!(["A"]), json!([["A"]]), None).unwrap_err();
        assert!(matches!(err, EvalError::Config(_)));
    }

    #[test]
    fn disabled_resampling_drops_intervals_and_keeps_the_metric_intact() {
        let metric: Arc<dyn Metric> = Arc::new(InstanceMetric::new(Accuracy));
        let predictions = json!(["A", "B", "C", "D", "E"]);
        let references = json!([["B"], ["B"], ["C"], ["D"], ["E"]]);

        let without = apply_metric_with(
            Arc::clone(&metric),
            Resampling::Disabled,
            predictions.clone(),
            references.clone(),
            None,
        )
        .unwrap();
        let global = &without[0].score().unwrap().global;
        assert!(global.keys().all(|k| !k.contains("ci_low") && !k.contains("ci_high")));

        let first = apply_metric(Arc::clone(&metric), predictions.clone(), references.clone(), None).unwrap();
        let second = apply_metric(metric, predictions, references, None).unwrap();
        let first = &first[0].score().unwrap().global;
        assert!(first.contains_key("accuracy_ci_low") && first.contains_key("score_ci_high"));
        assert_eq!(first, &second[0].score().unwrap().global);
    }

    #[test]
    fn interval_brackets_the_accuracy() {
        let predictions: Vec<&str> = ["A", "B", "C", "D", "E"].repeat(20);
        let references: Vec<[&str; 1]> = [["B"], ["B"], ["C"], ["D"], ["E"]].repeat(20);
        let out = apply_metric(
            Arc::new(InstanceMetric::new(Accuracy)),
            json!(predictions),
            json!(references),
            None,
        )
        .unwrap();
        let global = &out[0].score().unwrap().global;
        let low = global.number("score_ci_low").unwrap();
        let high = global.number("score_ci_high").unwrap();
        assert!(0.65 < low && low < 0.8, "{low}");
        assert!(0.8 < high && high < 0.93, "{high}");
    }

    #[test]
    fn sequential_metrics_merge_their_scores() {
        let out = apply_metric(
            Arc::new(InstanceMetric::new(Accuracy)),
            json!(["A", "B"]),
            json!([["A"], ["A"]]),
            None,
        )
        .unwrap();
        let out = crate::testing::apply_metric_to_instances(
            Arc::new(InstanceMetric::new(StringContainment)),
            out,
        )
        .unwrap();
        let record = out[0].score().unwrap();
        assert!(record.instance.contains_key("accuracy"));
        assert!(record.instance.contains_key("string_containment"));
        assert!(record.global.contains_key("accuracy"));
        assert_eq!(record.global.text("score_name"), Some("string_containment"));
    }
}
