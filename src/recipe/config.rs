use crate::error::{EvalError, Result};
use crate::recipe::card::{TaskCard, TemplateIndex};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn default_demos_taken_from() -> String {
    "train".to_string()
}

fn default_demos_pool_name() -> String {
    "demos_pool".to_string()
}

fn default_demos_field() -> String {
    "demos".to_string()
}

fn default_sampler_seed() -> u64 {
    42
}

/// Dataset recipe settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RecipeConfig {
    #[serde(default)]
    pub template: Option<String>,

    #[serde(default)]
    pub template_card_index: Option<TemplateIndex>,

    #[serde(default)]
    #[schemars(title = "Demonstrations", description = "Demos attached to every instance")]
    pub num_demos: usize,

    #[serde(default)]
    pub demos_pool_size: Option<usize>,

    #[serde(default = "default_demos_taken_from")]
    pub demos_taken_from: String,

    #[serde(default = "default_demos_pool_name")]
    pub demos_pool_name: String,

    #[serde(default = "default_demos_field")]
    pub demos_field: String,

    #[serde(default = "default_sampler_seed")]
    pub sampler_seed: u64,

    #[serde(default)]
    #[schemars(title = "Loader Limit", description = "Cap on instances read per partition")]
    pub loader_limit: Option<usize>,

    #[serde(default)]
    pub max_train_instances: Option<usize>,

    #[serde(default)]
    pub max_validation_instances: Option<usize>,

    #[serde(default)]
    pub max_test_instances: Option<usize>,
}

impl Default for RecipeConfig {
    fn default() -> Self {
        Self {
            template: None,
            template_card_index: None,
            num_demos: 0,
            demos_pool_size: None,
            demos_taken_from: default_demos_taken_from(),
            demos_pool_name: default_demos_pool_name(),
            demos_field: default_demos_field(),
            sampler_seed: default_sampler_seed(),
            loader_limit: None,
            max_train_instances: None,
            max_validation_instances: None,
            max_test_instances: None,
        }
    }
}

impl RecipeConfig {
    /// Per-partition caps applied after the demo pool is carved out.
    pub fn max_instances(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        [
            ("train", self.max_train_instances),
            ("validation", self.max_validation_instances),
            ("test", self.max_test_instances),
        ]
        .into_iter()
        .filter_map(|(split, limit)| limit.map(|n| (split, n)))
    }

    pub fn validate(&self, card: &TaskCard) -> Result<()> {
        self.validate_template(card)?;
        self.validate_demos(card)?;
        self.validate_loader_limit()
    }

    fn validate_template(&self, card: &TaskCard) -> Result<()> {
        match (&self.template, &self.template_card_index) {
            (None, None) => Err(EvalError::config(
                "Specify either template or template_card_index in card",
            )),
            (Some(template), Some(index)) => Err(EvalError::config(format!(
                "Specify either template ({template}) or template_card_index ({index}) but not both"
            ))),
            (None, Some(index)) if card.templates.get(index).is_none() => Err(EvalError::config(format!(
                "template_card_index ({index}) is not defined in card."
            ))),
            _ => Ok(()),
        }
    }

    fn validate_demos(&self, card: &TaskCard) -> Result<()> {
        if self.num_demos == 0 {
            return Ok(());
        }
        let pool_size = match self.demos_pool_size {
            Some(size) if size > 0 => size,
            _ => {
                return Err(EvalError::config(
                    "When using demonstrations both num_demos and demos_pool_size should be assigned with positive integers.",
                ));
            }
        };
        if self.num_demos > pool_size {
            return Err(EvalError::config(format!(
                "num_demos (got: {}) should not exceed demos_pool_size (got: {pool_size})",
                self.num_demos
            )));
        }
        if card.sampler.is_none() {
            return Err(EvalError::config(
                "Unexpected None value for card.sampler. To use num_demos > 0, please set a sampler on the TaskCard.",
            ));
        }
        Ok(())
    }

    fn validate_loader_limit(&self) -> Result<()> {
        let Some(limit) = self.loader_limit else {
            return Ok(());
        };
        for (split, max) in self.max_instances() {
            if max > limit {
                return Err(EvalError::config(format!(
                    "max_{split}_instances should not exceed loader_limit ({max} > {limit})"
                )));
            }
        }
        match self.demos_pool_size {
            Some(size) if size > limit => Err(EvalError::config(format!(
                "demos_pool_size should not exceed loader_limit ({size} > {limit})"
            ))),
            _ => Ok(()),
        }
    }
}
