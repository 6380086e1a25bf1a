use crate::core::instances::Instance;
use crate::error::{EvalError, Result};
use crate::operators::StreamOperator;
use crate::recipe::card::RandomSampler;
use crate::streams::{InstanceIter, MultiStream, Stream};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::Value;
use tracing::debug;

/// Moves the first `size` instances of one partition into a new pool
/// partition.
#[derive(Debug, Clone)]
pub struct CreateDemosPool {
    from_stream: String,
    pool_name: String,
    size: usize,
}

impl CreateDemosPool {
    pub fn new(from_stream: impl Into<String>, pool_name: impl Into<String>, size: usize) -> Self {
        Self {
            from_stream: from_stream.into(),
            pool_name: pool_name.into(),
            size,
        }
    }
}

impl StreamOperator for CreateDemosPool {
    fn apply(&self, mut multi_stream: MultiStream) -> Result<MultiStream> {
        let pool = match multi_stream.remove(&self.from_stream) {
            Some(source) => {
                let source = source.cached();
                multi_stream.insert(self.from_stream.clone(), source.clone().skip_instances(self.size));
                source.take_instances(self.size)
            }
            None => {
                debug!(stream = %self.from_stream, "no partition to take demos from");
                Stream::from_instances(Vec::new(), true)
            }
        };
        multi_stream.insert(self.pool_name.clone(), pool);
        Ok(multi_stream)
    }
}

/// Attaches `num_demos` pool instances to every instance of every other
/// partition. Each pass over a partition re-seeds the generator, so repeated
/// passes see the same demos.
#[derive(Debug, Clone)]
pub struct AddDemosField {
    pool_name: String,
    demos_field: String,
    num_demos: usize,
    sampler: RandomSampler,
    seed: u64,
}

impl AddDemosField {
    pub fn new(
        pool_name: impl Into<String>,
        demos_field: impl Into<String>,
        num_demos: usize,
        sampler: RandomSampler,
        seed: u64,
    ) -> Self {
        Self {
            pool_name: pool_name.into(),
            demos_field: demos_field.into(),
            num_demos,
            sampler,
            seed,
        }
    }
}

impl StreamOperator for AddDemosField {
    fn apply(&self, multi_stream: MultiStream) -> Result<MultiStream> {
        let pool = multi_stream.stream(&self.pool_name)?.clone();
        multi_stream.map_streams(|name, stream| {
            if name == self.pool_name {
                return Ok(stream);
            }
            let copying = stream.is_copying();
            let pool = pool.clone();
            let op = self.clone();
            Ok(Stream::from_generator(
                move || {
                    let demos_pool = pool.collect_instances()?;
                    let mut rng = StdRng::seed_from_u64(op.seed);
                    let op = op.clone();
                    let iter = stream.iter()?.map(move |item| {
                        item.and_then(|instance| op.add_demos(instance, &demos_pool, &mut rng))
                    });
                    Ok(Box::new(iter) as InstanceIter)
                },
                copying,
            ))
        })
    }
}

impl AddDemosField {
    fn add_demos(&self, mut instance: Instance, pool: &[Instance], rng: &mut StdRng) -> Result<Instance> {
        let demos = self
            .sampler
            .sample(rng, pool, &instance, self.num_demos)
            .ok_or_else(|| {
                EvalError::InsufficientInstances(format!(
                    "Unable to fetch instances from '{}' to '{}'",
                    self.pool_name, self.demos_field
                ))
            })?;
        let demos = demos.iter().map(Instance::to_value).collect::<Result<Vec<Value>>>()?;
        instance.insert(self.demos_field.clone(), Value::Array(demos));
        Ok(instance)
    }
}
