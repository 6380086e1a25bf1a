use crate::core::instances::Instance;
use crate::error::{EvalError, Result};
use crate::streams::Stream;
use std::collections::BTreeMap;
use std::collections::btree_map;

/// Named partitions (e.g. "train", "test"), each a [`Stream`].
///
/// Partition names mean nothing to the container itself; operators decide
/// which partitions they act on.
#[derive(Debug, Clone, Default)]
pub struct MultiStream {
    streams: BTreeMap<String, Stream>,
}

impl MultiStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a multi-stream from in-memory partitions. With `copying` every
    /// partition may be iterated more than once.
    pub fn from_iterables<I, K>(iterables: I, copying: bool) -> Self
    where
        I: IntoIterator<Item = (K, Vec<Instance>)>,
        K: Into<String>,
    {
        iterables
            .into_iter()
            .map(|(name, instances)| (name.into(), Stream::from_instances(instances, copying)))
            .collect()
    }

    pub fn from_streams<I, K>(streams: I) -> Self
    where
        I: IntoIterator<Item = (K, Stream)>,
        K: Into<String>,
    {
        streams
            .into_iter()
            .map(|(name, stream)| (name.into(), stream))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&Stream> {
        self.streams.get(name)
    }

    pub fn stream(&self, name: &str) -> Result<&Stream> {
        self.streams
            .get(name)
            .ok_or_else(|| EvalError::MissingStream(name.to_string()))
    }

    pub fn insert(&mut self, name: impl Into<String>, stream: Stream) -> Option<Stream> {
        self.streams.insert(name.into(), stream)
    }

    pub fn remove(&mut self, name: &str) -> Option<Stream> {
        self.streams.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.streams.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Replaces every partition with `f(name, stream)`.
    pub fn map_streams<F>(self, mut f: F) -> Result<Self>
    where
        F: FnMut(&str, Stream) -> Result<Stream>,
    {
        let mut out = BTreeMap::new();
        for (name, stream) in self.streams {
            let mapped = f(&name, stream)?;
            out.insert(name, mapped);
        }
        Ok(Self { streams: out })
    }

    /// Runs every partition to completion.
    pub fn materialize(&self) -> Result<BTreeMap<String, Vec<Instance>>> {
        self.streams
            .iter()
            .map(|(name, stream)| Ok((name.clone(), stream.collect_instances()?)))
            .collect()
    }
}

impl FromIterator<(String, Stream)> for MultiStream {
    fn from_iter<T: IntoIterator<Item = (String, Stream)>>(iter: T) -> Self {
        Self {
            streams: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for MultiStream {
    type Item = (String, Stream);
    type IntoIter = btree_map::IntoIter<String, Stream>;

    fn into_iter(self) -> Self::IntoIter {
        self.streams.into_iter()
    }
}
