use crate::core::instances::Instance;
use crate::error::Result;
use crate::operators::InstanceOperator;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Pass-through instance operator that counts how often it ran. Clones share
/// the counter.
#[derive(Clone, Default)]
pub struct CountingOperator {
    calls: Arc<AtomicUsize>,
}

impl CountingOperator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl InstanceOperator for CountingOperator {
    fn process(&self, instance: Instance, _stream_name: &str) -> Result<Instance> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(instance)
    }
}
