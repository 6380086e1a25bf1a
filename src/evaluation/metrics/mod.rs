mod classification;
mod effect_size;
mod global_metric;
mod instance_metric;
mod metric;
mod ranking;
pub mod reduction;
mod rouge;
mod text;

pub use classification::{F1, F1Average, F1MultiLabel, NONE_LABEL};
pub use effect_size::{normalized_cohens_h, normalized_hedges_g, performance_drop_rate};
pub use global_metric::{GlobalMetric, GlobalScorer};
pub use instance_metric::{GROUP_ID_FIELD, InstanceMetric, InstanceScorer};
pub use metric::{ConfidenceConfig, Metric, MetricOperator, Resampling};
pub use ranking::{KendallTau, RocAuc};
pub use reduction::{GroupAggregation, GroupReduction, Reduction};
pub use rouge::{ROUGE_TYPES, Rouge};
pub use text::{Accuracy, Squad, StringContainment, TokenOverlap};
