use crate::error::{EvalError, Result};
use crate::operators::StreamOperator;
use crate::streams::{MultiStream, Stream};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Keeps the first `n` instances of the listed partitions.
#[derive(Debug, Clone, Default)]
pub struct TakeFirst {
    limits: BTreeMap<String, usize>,
    all: Option<usize>,
}

impl TakeFirst {
    /// Same limit for every partition.
    pub fn all(n: usize) -> Self {
        Self {
            limits: BTreeMap::new(),
            all: Some(n),
        }
    }

    pub fn with_limit(mut self, stream: impl Into<String>, n: usize) -> Self {
        self.limits.insert(stream.into(), n);
        self
    }
}

impl StreamOperator for TakeFirst {
    fn apply(&self, multi_stream: MultiStream) -> Result<MultiStream> {
        multi_stream.map_streams(|name, stream| {
            Ok(match self.limits.get(name).copied().or(self.all) {
                Some(n) => stream.take_instances(n),
                None => stream,
            })
        })
    }
}

/// Keeps instances whose fields equal every required value.
#[derive(Debug, Clone)]
pub struct FilterByValues {
    required: Map<String, Value>,
}

impl FilterByValues {
    pub fn new(required: Map<String, Value>) -> Self {
        Self { required }
    }
}

impl StreamOperator for FilterByValues {
    fn apply(&self, multi_stream: MultiStream) -> Result<MultiStream> {
        multi_stream.map_streams(|_, stream| {
            let required = self.required.clone();
            Ok(stream.filter_instances(move |instance| {
                for (field, expected) in &required {
                    if instance.require(field)? != expected {
                        return Ok(false);
                    }
                }
                Ok(true)
            }))
        })
    }
}

/// Concatenates several partitions into a new one, optionally recording each
/// instance's origin partition in a field. Source partitions are removed.
#[derive(Debug, Clone)]
pub struct MergeStreams {
    streams_to_merge: Vec<String>,
    new_stream_name: String,
    origin_field: Option<String>,
}

impl MergeStreams {
    pub fn new<I, S>(streams_to_merge: I, new_stream_name: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            streams_to_merge: streams_to_merge.into_iter().map(Into::into).collect(),
            new_stream_name: new_stream_name.into(),
            origin_field: None,
        }
    }

    pub fn with_origin_field(mut self, field: impl Into<String>) -> Self {
        self.origin_field = Some(field.into());
        self
    }
}

impl StreamOperator for MergeStreams {
    fn apply(&self, mut multi_stream: MultiStream) -> Result<MultiStream> {
        let mut merged: Option<Stream> = None;
        for name in &self.streams_to_merge {
            let stream = multi_stream
                .remove(name)
                .ok_or_else(|| EvalError::MissingStream(name.clone()))?;
            let stream = match &self.origin_field {
                Some(field) => {
                    let field = field.clone();
                    let origin = name.clone();
                    stream.map_instances(move |i| Ok(i.with(field.clone(), origin.clone())))
                }
                None => stream,
            };
            merged = Some(match merged {
                Some(acc) => acc.chain(stream),
                None => stream,
            });
        }
        let merged = merged.unwrap_or_else(|| Stream::from_instances(Vec::new(), true));
        multi_stream.insert(self.new_stream_name.clone(), merged);
        Ok(multi_stream)
    }
}

/// Renames partitions; unlisted partitions keep their names.
#[derive(Debug, Clone)]
pub struct RenameSplits {
    mapper: BTreeMap<String, String>,
}

impl RenameSplits {
    pub fn new<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        Self {
            mapper: pairs.into_iter().map(|(a, b)| (a.into(), b.into())).collect(),
        }
    }
}

impl StreamOperator for RenameSplits {
    fn apply(&self, multi_stream: MultiStream) -> Result<MultiStream> {
        Ok(multi_stream
            .into_iter()
            .map(|(name, stream)| match self.mapper.get(&name) {
                Some(new_name) => (new_name.clone(), stream),
                None => (name, stream),
            })
            .collect())
    }
}

/// Drops partitions by name; absent names are ignored.
#[derive(Debug, Clone)]
pub struct DeleteSplits {
    names: Vec<String>,
}

impl DeleteSplits {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl StreamOperator for DeleteSplits {
    fn apply(&self, mut multi_stream: MultiStream) -> Result<MultiStream> {
        for name in &self.names {
            multi_stream.remove(name);
        }
        Ok(multi_stream)
    }
}

/// Shuffles every partition with a generator seeded per pass, so repeated
/// runs yield the same order.
#[derive(Debug, Clone)]
pub struct Shuffle {
    seed: u64,
}

impl Shuffle {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl StreamOperator for Shuffle {
    fn apply(&self, multi_stream: MultiStream) -> Result<MultiStream> {
        let seed = self.seed;
        multi_stream.map_streams(|_, stream| {
            Ok(stream.transform_all(move |mut instances| {
                let mut rng = StdRng::seed_from_u64(seed);
                instances.shuffle(&mut rng);
                Ok(instances)
            }))
        })
    }
}
