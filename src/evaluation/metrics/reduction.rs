use crate::error::{EvalError, Result};
use crate::evaluation::metrics::effect_size::{
    normalized_cohens_h, normalized_hedges_g, performance_drop_rate,
};
use crate::utils::math::mean;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

pub const MEAN_REDUCTION: &str = "mean";
pub const GROUP_MEAN_REDUCTION: &str = "group_mean";

/// Task-data key naming the variant type of a grouped instance.
pub const SUBGROUP_COLUMN: &str = "variant_type";
pub const CONTROL_SUBGROUP: &str = "original";
pub const COMPARISON_SUBGROUP: &str = "paraphrase";

/// Function applied to the instance scores of one group.
///
/// Comparison functions split the group by subgroup into
/// [`CONTROL_SUBGROUP`] and [`COMPARISON_SUBGROUP`] instances.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
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
pub enum GroupAggregation {
    Mean,
    MeanBaseline,
    MeanParaphrase,
    PerformanceDropRate,
    NormalizedCohensH,
    NormalizedHedgesG,
    AbsvalNormalizedCohensH,
    AbsvalNormalizedHedgesG,
}

impl GroupAggregation {
    /// Name used inside reported score names.
    pub fn score_label(self) -> &'static str {
        match self {
            GroupAggregation::Mean => "mean",
            GroupAggregation::MeanBaseline => "mean_baseline",
            GroupAggregation::MeanParaphrase => "mean_paraphrase",
            GroupAggregation::PerformanceDropRate => "pdr_paraphrase",
            GroupAggregation::NormalizedCohensH => "norm_cohens_h_paraphrase",
            GroupAggregation::NormalizedHedgesG => "norm_hedges_g_paraphrase",
            GroupAggregation::AbsvalNormalizedCohensH => "absval_norm_cohens_h_paraphrase",
            GroupAggregation::AbsvalNormalizedHedgesG => "absval_norm_hedges_g_paraphrase",
        }
    }

    pub fn needs_subgroups(self) -> bool {
        !matches!(self, GroupAggregation::Mean)
    }

    /// Aggregates `(score, subgroup)` pairs of one group. Means inside a
    /// group are strict: a NaN instance score makes the group value NaN.
    pub fn aggregate(self, scores: &[(f64, Option<&str>)]) -> Result<f64> {
        let subgroup = |wanted: &str| -> Vec<f64> {
            scores
                .iter()
                .filter(|(_, s)| *s == Some(wanted))
                .map(|(v, _)| *v)
                .collect()
        };
        let control = || subgroup(CONTROL_SUBGROUP);
        let comparison = || subgroup(COMPARISON_SUBGROUP);
        Ok(match self {
            GroupAggregation::Mean => mean(&scores.iter().map(|(v, _)| *v).collect::<Vec<_>>()),
            GroupAggregation::MeanBaseline => mean(&control()),
            GroupAggregation::MeanParaphrase => mean(&comparison()),
            GroupAggregation::PerformanceDropRate => performance_drop_rate(&control(), &comparison()),
            GroupAggregation::NormalizedCohensH => normalized_cohens_h(&control(), &comparison())?,
            GroupAggregation::NormalizedHedgesG => normalized_hedges_g(&control(), &comparison()),
            GroupAggregation::AbsvalNormalizedCohensH => {
                normalized_cohens_h(&control(), &comparison())?.abs()
            }
            GroupAggregation::AbsvalNormalizedHedgesG => {
                normalized_hedges_g(&control(), &comparison()).abs()
            }
        })
    }
}

/// A parsed `group_mean` reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupReduction {
    pub label: String,
    pub aggregation: GroupAggregation,
    /// Bootstrap over whole groups instead of over instances.
    pub resample_groups: bool,
    pub fields: Vec<String>,
}

impl GroupReduction {
    pub fn new(aggregation: GroupAggregation, resample_groups: bool, fields: Vec<String>) -> Self {
        Self {
            label: aggregation.score_label().to_string(),
            aggregation,
            resample_groups,
            fields,
        }
    }

    /// `fixed_group_{label}_` or `group_{label}_`.
    pub fn score_prefix(&self) -> String {
        let kind = if self.resample_groups { "fixed_group_" } else { "group_" };
        format!("{kind}{}_", self.label)
    }

    /// Raw reduction-map form, as accepted by [`parse_reductions`].
    pub fn to_value(&self) -> Value {
        let function: &'static str = self.aggregation.into();
        json!({
            GROUP_MEAN_REDUCTION: {
                "agg_func": [self.label, function, self.resample_groups],
                "score_fields": self.fields,
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reduction {
    Mean { fields: Vec<String> },
    GroupMean(GroupReduction),
}

/// Validates a raw reduction map of the form `{"mean": [fields...]}` or
/// `{"group_mean": {"agg_func": [label, function, resample_groups],
/// "score_fields": [...]}}`.
pub fn parse_reductions(
    map: &Value,
    implemented: &[String],
    default_fields: &[String],
) -> Result<Vec<Reduction>> {
    let Value::Object(entries) = map else {
        return Err(EvalError::config(format!(
            "reduction_map must be a mapping, got {map}"
        )));
    };
    entries
        .iter()
        .map(|(kind, params)| {
            if !implemented.iter().any(|r| r == kind) {
                return Err(EvalError::config(format!(
                    "Reduction {kind} is not implemented, use one of {implemented:?}"
                )));
            }
            match kind.as_str() {
                MEAN_REDUCTION => Ok(Reduction::Mean {
                    fields: string_list(params, "fields of reduction mean")?,
                }),
                GROUP_MEAN_REDUCTION => parse_group_mean(params, default_fields).map(Reduction::GroupMean),
                other => Err(EvalError::config(format!("Reduction {other} is not supported."))),
            }
        })
        .collect()
}

fn parse_group_mean(params: &Value, default_fields: &[String]) -> Result<GroupReduction> {
    let agg_func = params.get("agg_func").ok_or_else(|| {
        EvalError::config("reduction group_mean must define agg_func as [label, function, resample_groups]")
    })?;
    let [label, function, resample_groups] = agg_func.as_array().map(Vec::as_slice).unwrap_or_default() else {
        return Err(EvalError::config(format!(
            "agg_func must be a list [label, function, resample_groups], got {agg_func}"
        )));
    };
    let label = label.as_str().ok_or_else(|| {
        EvalError::config(format!("first element of agg_func should be a score label, got {label}"))
    })?;
    let aggregation = function
        .as_str()
        .and_then(|id| GroupAggregation::from_str(id).ok())
        .ok_or_else(|| {
            EvalError::config(format!(
                "second element of agg_func should be a callable function, got {function}"
            ))
        })?;
    let resample_groups = resample_groups.as_bool().ok_or_else(|| {
        EvalError::config(format!(
            "third element of agg_func should be a boolean, got {resample_groups}"
        ))
    })?;
    let fields = match params.get("score_fields") {
        Some(fields) => string_list(fields, "score_fields")?,
        None => default_fields.to_vec(),
    };
    Ok(GroupReduction {
        label: label.to_string(),
        aggregation,
        resample_groups,
        fields,
    })
}

fn string_list(value: &Value, what: &str) -> Result<Vec<String>> {
    value
        .as_array()
        .and_then(|items| items.iter().map(|v| v.as_str().map(str::to_string)).collect())
        .ok_or_else(|| EvalError::config(format!("{what} must be a list of score names, got {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn implemented() -> Vec<String> {
        vec![MEAN_REDUCTION.to_string(), GROUP_MEAN_REDUCTION.to_string()]
    }

    fn main_fields() -> Vec<String> {
        vec!["accuracy".to_string()]
    }

    fn config_message(map: Value, implemented: &[String]) -> String {
        match parse_reductions(&map, implemented, &main_fields()) {
            Err(EvalError::Config(m)) => m,
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }

    #[test]
    fn parses_both_reduction_kinds() {
        let reductions = parse_reductions(
            &json!({"mean": ["f1", "recall"], "group_mean": {"agg_func": ["mean", "mean", true]}}),
            &implemented(),
            &main_fields(),
        )
        .unwrap();
        assert_eq!(
            reductions[0],
            Reduction::Mean {
                fields: vec!["f1".into(), "recall".into()]
            }
        );
        let Reduction::GroupMean(group) = &reductions[1] else {
            panic!("expected a group reduction");
        };
        assert_eq!(group.fields, main_fields());
        assert_eq!(group.score_prefix(), "fixed_group_mean_");
    }

    #[test]
    fn group_reduction_round_trips_through_its_raw_form() {
        for aggregation in GroupAggregation::iter() {
            let group = GroupReduction::new(aggregation, false, main_fields());
            let parsed = parse_reductions(&group.to_value(), &implemented(), &[]).unwrap();
            assert_eq!(parsed, vec![Reduction::GroupMean(group)]);
        }
    }

    #[test]
    fn invalid_reduction_maps() {
        let mut extended = implemented();
        extended.push("some_other_func".into());
        assert!(
            config_message(json!({"some_other_func": {"agg_func": ["mean", "mean", false]}}), &implemented())
                .starts_with("Reduction some_other_func is not implemented")
        );
        assert_eq!(
            config_message(json!({"some_other_func": {}}), &extended),
            "Reduction some_other_func is not supported."
        );
        assert!(config_message(json!({"group_mean": {"func": ["mean", "mean"]}}), &implemented()).contains("agg_func"));
        assert!(
            config_message(json!({"group_mean": {"agg_func": ["mean", "some string", false]}}), &implemented())
                .contains("callable")
        );
        assert!(
            config_message(json!({"group_mean": {"agg_func": ["mean", "mean", 1]}}), &implemented())
                .contains("boolean")
        );
        assert!(config_message(json!({"group_mean": {"agg_func": ["mean", "mean"]}}), &implemented()).contains("list"));
    }

    #[test]
    fn aggregations_over_subgroups() {
        let group = [
            (1.0, Some(CONTROL_SUBGROUP)),
            (1.0, Some(COMPARISON_SUBGROUP)),
            (0.0, Some(COMPARISON_SUBGROUP)),
            (0.0, Some(COMPARISON_SUBGROUP)),
        ];
        assert_eq!(GroupAggregation::Mean.aggregate(&group).unwrap(), 0.5);
        assert_eq!(GroupAggregation::MeanBaseline.aggregate(&group).unwrap(), 1.0);
        let pdr = GroupAggregation::PerformanceDropRate.aggregate(&group).unwrap();
        assert!((pdr - 2.0 / 3.0).abs() < 1e-12);
        assert!(GroupAggregation::MeanParaphrase.aggregate(&group[..1]).unwrap().is_nan());
        assert!(GroupAggregation::Mean.aggregate(&[(f64::NAN, None), (1.0, None)]).unwrap().is_nan());
    }
}
