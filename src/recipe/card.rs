use crate::core::instances::Instance;
use crate::operators::StreamOperator;
use crate::streams::Loader;
use rand::rngs::StdRng;
use rand::seq::index;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Reference to one of a card's templates: a position in a template list or
/// a key in a template map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum TemplateIndex {
    Position(usize),
    Name(String),
}

impl fmt::Display for TemplateIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateIndex::Position(i) => write!(f, "{i}"),
            TemplateIndex::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Templates {
    List(Vec<String>),
    Named(BTreeMap<String, String>),
}

impl Default for Templates {
    fn default() -> Self {
        Templates::List(Vec::new())
    }
}

impl Templates {
    pub fn get(&self, index: &TemplateIndex) -> Option<&str> {
        match (self, index) {
            (Templates::List(list), TemplateIndex::Position(i)) => list.get(*i).map(String::as_str),
            (Templates::Named(map), TemplateIndex::Name(name)) => map.get(name).map(String::as_str),
            _ => None,
        }
    }
}

/// Picks demonstrations uniformly, without replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RandomSampler;

impl RandomSampler {
    /// `n` pool instances different from `instance`, or `None` when the pool
    /// has too few of them.
    pub fn sample(&self, rng: &mut StdRng, pool: &[Instance], instance: &Instance, n: usize) -> Option<Vec<Instance>> {
        let candidates: Vec<&Instance> = pool.iter().filter(|demo| demo.fields() != instance.fields()).collect();
        if candidates.len() < n {
            return None;
        }
        Some(
            index::sample(rng, candidates.len(), n)
                .into_iter()
                .map(|i| candidates[i].clone())
                .collect(),
        )
    }
}

/// Everything a recipe needs to know about one dataset.
pub struct TaskCard {
    pub loader: Box<dyn Loader>,
    pub preprocess_steps: Vec<Arc<dyn StreamOperator>>,
    pub templates: Templates,
    pub sampler: Option<RandomSampler>,
}

impl TaskCard {
    pub fn new(loader: impl Loader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            preprocess_steps: Vec::new(),
            templates: Templates::default(),
            sampler: Some(RandomSampler),
        }
    }

    pub fn with_preprocess_step(mut self, step: impl StreamOperator + 'static) -> Self {
        self.preprocess_steps.push(Arc::new(step));
        self
    }

    pub fn with_templates(mut self, templates: Templates) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_sampler(mut self, sampler: Option<RandomSampler>) -> Self {
        self.sampler = sampler;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn template_lookup_matches_index_kind() {
        let list = Templates::List(vec!["templates.key_val".into()]);
        assert_eq!(list.get(&TemplateIndex::Position(0)), Some("templates.key_val"));
        assert_eq!(list.get(&TemplateIndex::Position(1)), None);
        assert_eq!(list.get(&TemplateIndex::Name("0".into())), None);

        let named = Templates::Named(BTreeMap::from([("short".to_string(), "templates.short".to_string())]));
        assert_eq!(named.get(&TemplateIndex::Name("short".into())), Some("templates.short"));
    }

    #[test]
    fn sampler_excludes_the_instance_itself() {
        let pool: Vec<Instance> = (0..3).map(|i| Instance::new().with("i", i)).collect();
        let mut rng = StdRng::seed_from_u64(0);
        let demos = RandomSampler.sample(&mut rng, &pool, &pool[1], 2).unwrap();
        assert_eq!(demos.len(), 2);
        assert!(demos.iter().all(|d| d != &pool[1]));
        assert!(RandomSampler.sample(&mut rng, &pool, &pool[1], 3).is_none());
    }
}
