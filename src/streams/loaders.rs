use crate::core::instances::Instance;
use crate::error::{EvalError, Result};
use crate::streams::{InstanceIter, MultiStream, Stream};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing::debug;

/// Producer of the raw partitions a pipeline starts from.
pub trait Loader {
    fn load(&self) -> Result<MultiStream>;
}

/// Serves partitions held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoader {
    partitions: BTreeMap<String, Vec<Instance>>,
    copying: bool,
}

impl InMemoryLoader {
    pub fn new(copying: bool) -> Self {
        Self {
            partitions: BTreeMap::new(),
            copying,
        }
    }

    pub fn with_partition(mut self, name: impl Into<String>, instances: Vec<Instance>) -> Self {
        self.partitions.insert(name.into(), instances);
        self
    }
}

impl Loader for InMemoryLoader {
    fn load(&self) -> Result<MultiStream> {
        Ok(MultiStream::from_iterables(
            self.partitions.clone(),
            self.copying,
        ))
    }
}

/// Reads one JSON Lines file per partition.
///
/// Files are opened lazily, when a partition is first iterated, and reopened
/// on every pass, so the produced streams are restartable. Blank lines are
/// skipped.
#[derive(Debug, Clone, Default)]
pub struct JsonlLoader {
    files: BTreeMap<String, PathBuf>,
    loader_limit: Option<usize>,
}

impl JsonlLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, partition: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.files.insert(partition.into(), path.into());
        self
    }

    /// Caps every partition at `limit` instances.
    pub fn with_loader_limit(mut self, limit: usize) -> Self {
        self.loader_limit = Some(limit);
        self
    }
}

impl Loader for JsonlLoader {
    fn load(&self) -> Result<MultiStream> {
        let mut ms = MultiStream::new();
        for (partition, path) in &self.files {
            let path = path.clone();
            let limit = self.loader_limit;
            let stream = Stream::from_generator(
                move || {
                    debug!(path = %path.display(), "opening jsonl partition");
                    let iter = read_jsonl(path.clone())?;
                    Ok(match limit {
                        Some(n) => Box::new(iter.take(n)) as InstanceIter,
                        None => iter,
                    })
                },
                true,
            );
            ms.insert(partition.clone(), stream);
        }
        Ok(ms)
    }
}

fn read_jsonl(path: PathBuf) -> Result<InstanceIter> {
    let reader = BufReader::new(File::open(&path)?);
    let iter = reader
        .lines()
        .enumerate()
        .filter_map(move |(idx, line)| {
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(EvalError::Io(e))),
            };
            if line.trim().is_empty() {
                return None;
            }
            let parsed = serde_json::from_str(&line)
                .map_err(|e| {
                    EvalError::format(format!("{}:{}: {e}", path.display(), idx + 1))
                })
                .and_then(Instance::from_value);
            Some(parsed)
        });
    Ok(Box::new(iter))
}
