use crate::error::Result;
use crate::operators::{DeleteSplits, SequentialOperator, StreamOperator, TakeFirst};
use crate::recipe::card::{RandomSampler, TaskCard};
use crate::recipe::config::RecipeConfig;
use crate::recipe::demos::{AddDemosField, CreateDemosPool};
use crate::streams::MultiStream;
use std::sync::Arc;
use tracing::info;

/// A validated card + config pair that produces the prepared partitions.
pub struct Recipe {
    card: TaskCard,
    config: RecipeConfig,
}

impl Recipe {
    pub fn new(card: TaskCard, config: RecipeConfig) -> Result<Self> {
        config.validate(&card)?;
        Ok(Self { card, config })
    }

    pub fn config(&self) -> &RecipeConfig {
        &self.config
    }

    /// The full step list, built fresh on every call so sampling starts
    /// from the configured seed.
    fn steps(&self) -> Vec<Arc<dyn StreamOperator>> {
        let config = &self.config;
        let mut steps: Vec<Arc<dyn StreamOperator>> = Vec::new();
        if let Some(limit) = config.loader_limit {
            steps.push(Arc::new(TakeFirst::all(limit)));
        }
        steps.extend(self.card.preprocess_steps.iter().cloned());

        let pool_size = config.demos_pool_size.filter(|size| *size > 0);
        if let Some(size) = pool_size {
            steps.push(Arc::new(CreateDemosPool::new(
                config.demos_taken_from.clone(),
                config.demos_pool_name.clone(),
                size,
            )));
        }

        let refiners = config
            .max_instances()
            .fold(TakeFirst::default(), |take, (split, n)| take.with_limit(split, n));
        steps.push(Arc::new(refiners));

        if config.num_demos > 0 {
            steps.push(Arc::new(AddDemosField::new(
                config.demos_pool_name.clone(),
                config.demos_field.clone(),
                config.num_demos,
                self.card.sampler.unwrap_or(RandomSampler),
                config.sampler_seed,
            )));
        }
        if pool_size.is_some() {
            steps.push(Arc::new(DeleteSplits::new([config.demos_pool_name.clone()])));
        }
        steps
    }

    /// Loads the card's data and runs every step. Nothing is read until a
    /// returned partition is iterated.
    pub fn produce(&self) -> Result<MultiStream> {
        let steps = self.steps();
        info!(
            steps = steps.len(),
            num_demos = self.config.num_demos,
            demos_pool_size = ?self.config.demos_pool_size,
            "building recipe"
        );
        let loaded = self.card.loader.load()?;
        SequentialOperator::new(steps).apply(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instances::Instance;
    use crate::error::EvalError;
    use crate::operators::{AddFields, ApplyToInstances};
    use crate::streams::InMemoryLoader;
    use serde_json::{Map, json};

    fn numbered(split: &str, n: usize) -> Vec<Instance> {
        (0..n).map(|i| Instance::new().with("split", split).with("i", i)).collect()
    }

    fn card(train: usize, test: usize) -> TaskCard {
        TaskCard::new(
            InMemoryLoader::new(true)
                .with_partition("train", numbered("train", train))
                .with_partition("test", numbered("test", test)),
        )
    }

    fn config() -> RecipeConfig {
        RecipeConfig {
            template: Some("templates.key_val".into()),
            ..Default::default()
        }
    }

    fn lengths(recipe: &Recipe) -> (usize, usize) {
        let out = recipe.produce().unwrap().materialize().unwrap();
        assert!(!out.contains_key("demos_pool"));
        (out["train"].len(), out["test"].len())
    }

    #[test]
    fn loader_limit_then_pool() {
        let recipe = Recipe::new(
            card(20, 20),
            RecipeConfig {
                demos_pool_size: Some(5),
                num_demos: 1,
                loader_limit: Some(10),
                ..config()
            },
        )
        .unwrap();
        assert_eq!(lengths(&recipe), (5, 10));
    }

    #[test]
    fn refiners_apply_after_the_pool() {
        let recipe = Recipe::new(
            card(9, 20),
            RecipeConfig {
                demos_pool_size: Some(3),
                num_demos: 3,
                max_train_instances: Some(10),
                max_test_instances: Some(5),
                ..config()
            },
        )
        .unwrap();
        assert_eq!(lengths(&recipe), (6, 5));

        let out = recipe.produce().unwrap().materialize().unwrap();
        let demos = out["test"][0].get("demos").unwrap().as_array().unwrap();
        assert_eq!(demos.len(), 3);
        assert!(demos.iter().all(|d| d["split"] == json!("train")));
    }

    #[test]
    fn runs_are_reproducible() {
        let recipe = Recipe::new(
            card(10, 4),
            RecipeConfig {
                demos_pool_size: Some(8),
                num_demos: 2,
                ..config()
            },
        )
        .unwrap();
        let first = recipe.produce().unwrap().materialize().unwrap();
        let second = recipe.produce().unwrap().materialize().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn demos_taken_from_the_evaluated_split() {
        let recipe = Recipe::new(
            card(0, 20),
            RecipeConfig {
                demos_pool_size: Some(10),
                num_demos: 3,
                demos_taken_from: "test".into(),
                ..config()
            },
        )
        .unwrap();
        let out = recipe.produce().unwrap().materialize().unwrap();
        assert_eq!(out["test"].len(), 10);
        assert!(out["test"].iter().all(|i| i.get("demos").is_some()));
    }

    #[test]
    fn empty_pool_fails_on_consumption() {
        let recipe = Recipe::new(
            card(0, 3),
            RecipeConfig {
                demos_pool_size: Some(10),
                num_demos: 3,
                ..config()
            },
        )
        .unwrap();
        let out = recipe.produce().unwrap();
        let err = out.stream("test").unwrap().collect_instances().unwrap_err();
        assert!(matches!(err, EvalError::InsufficientInstances(_)));
        assert_eq!(err.to_string(), "Unable to fetch instances from 'demos_pool' to 'demos'");
    }

    #[test]
    fn preprocess_steps_run_before_pooling() {
        let mut tag = Map::new();
        tag.insert("source".into(), json!("card"));
        let card = card(4, 2).with_preprocess_step(ApplyToInstances::new(AddFields::new(tag)));
        let recipe = Recipe::new(
            card,
            RecipeConfig {
                demos_pool_size: Some(2),
                num_demos: 1,
                ..config()
            },
        )
        .unwrap();
        let out = recipe.produce().unwrap().materialize().unwrap();
        let demo = &out["test"][0].get("demos").unwrap()[0];
        assert_eq!(demo["source"], json!("card"));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let err = Recipe::new(card(1, 1), RecipeConfig::default()).err().unwrap();
        assert!(matches!(err, EvalError::Config(_)));
    }
}
